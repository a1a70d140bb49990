//! Admission trait for abstracting the limiter behind request filters.

use std::time::Duration;

use super::decision::Decision;
use super::key::Key;

/// Trait for admission control implementations.
///
/// Request filters hold a `dyn Admission` so they can be tested against a
/// stub and wired to the process-wide [`Limiter`](super::Limiter) in
/// production.
pub trait Admission: Send + Sync {
    /// Decide whether a request from `key` may proceed under `max_rate`
    /// requests per `window`.
    fn check(&self, key: &Key, max_rate: u64, window: Duration) -> Decision;
}
