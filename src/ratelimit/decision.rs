//! Outcome of a single admission check.

use std::time::Duration;

/// The admission decision for one request.
///
/// Denial is an ordinary outcome, not an error: the caller decides how to
/// translate it (typically into a 429 with a `Retry-After` hint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request is within the limit for the current window.
    Admit {
        /// Requests counted in the current window, including this one
        count: u64,
        /// Requests still allowed before the window resets
        remaining: u64,
    },
    /// The request exceeds the limit for the current window.
    Deny {
        /// Requests counted in the current window, including this one
        count: u64,
        /// Time until the window resets, `None` if it never does
        retry_after: Option<Duration>,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Requests counted in the current window, including this one.
    pub fn count(&self) -> u64 {
        match self {
            Decision::Admit { count, .. } | Decision::Deny { count, .. } => *count,
        }
    }

    /// Retry hint for a denied request.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Admit { .. } => None,
            Decision::Deny { retry_after, .. } => *retry_after,
        }
    }
}
