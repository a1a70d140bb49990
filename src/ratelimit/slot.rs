//! Per-key fixed window state.

use std::time::{Duration, Instant};

/// Counting state for a single key.
///
/// A slot is owned by the limiter's store and only ever mutated while the
/// store holds the entry lock for its key, so plain fields are enough here.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// When the current window started
    window_start: Instant,
    /// Requests counted in the current window, admitted or denied
    count: u64,
    /// Most recent access, only used for idle eviction
    last_seen: Instant,
}

impl Slot {
    /// Create an empty slot whose first window starts at `now`.
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            last_seen: now,
        }
    }

    /// Record one request at `now` and return the count including it.
    ///
    /// A zero `window` never rolls over.
    pub(crate) fn hit(&mut self, now: Instant, window: Duration) -> u64 {
        if !window.is_zero() && now.saturating_duration_since(self.window_start) >= window {
            self.window_start = now;
            self.count = 0;
        }

        self.count += 1;
        // Callers race on Instant::now(), so a later hit may carry an earlier instant.
        self.last_seen = self.last_seen.max(now);
        self.count
    }

    /// Time left in the current window, or `None` if the window never ends.
    pub(crate) fn duration_until_reset(&self, now: Instant, window: Duration) -> Option<Duration> {
        if window.is_zero() {
            return None;
        }
        self.window_start
            .checked_add(window)
            .map(|end| end.saturating_duration_since(now))
    }

    /// Whether the slot has gone untouched for strictly longer than `max_idle`.
    pub(crate) fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > max_idle
    }

    /// Count in the window that was current at the last hit.
    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}
