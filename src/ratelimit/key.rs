//! Client identity used to bucket requests.

/// A key that uniquely identifies a rate limit subject.
///
/// Two keys are the same subject if and only if every field is equal.
/// No validation is performed on construction: empty strings are legal
/// and simply bucket together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    /// Tenant/context identifier (0 if none)
    pub context_id: u32,
    /// Client network address
    pub remote_addr: String,
    /// Client-declared user agent
    pub user_agent: String,
    /// Optional qualifier, e.g. the login endpoint name
    pub route_tag: Option<String>,
}

impl Key {
    /// Create a new key without a route qualifier.
    pub fn new(
        context_id: u32,
        remote_addr: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            context_id,
            remote_addr: remote_addr.into(),
            user_agent: user_agent.into(),
            route_tag: None,
        }
    }

    /// Return the same key qualified by a route tag.
    pub fn with_route(mut self, route_tag: impl Into<String>) -> Self {
        self.route_tag = Some(route_tag.into());
        self
    }

    /// Convert the key to a string representation.
    ///
    /// This is useful for logging and debugging.
    pub fn to_string_key(&self) -> String {
        match &self.route_tag {
            Some(route) => format!(
                "{}:{}:{}:{}",
                self.context_id, self.remote_addr, self.user_agent, route
            ),
            None => format!("{}:{}:{}", self.context_id, self.remote_addr, self.user_agent),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
