//! Core rate limiter implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, trace};

use super::admission::Admission;
use super::decision::Decision;
use super::key::Key;
use super::slot::Slot;

/// The core rate limiter that manages per-key fixed windows.
///
/// This struct is thread-safe and is meant to be created once per process
/// and shared behind an `Arc`. Limits are passed on every call rather than
/// stored, so they can be reloaded without rebuilding the limiter.
///
/// The store is a sharded map: a check locks only the shard holding its key,
/// so unrelated keys rarely contend and a sweep walks shards one at a time.
#[derive(Debug, Default)]
pub struct Limiter {
    /// Window state indexed by client key
    slots: DashMap<Key, Slot>,
    /// Every check since start, admitted or denied
    processed: AtomicU64,
    /// Checks that were denied
    denied: AtomicU64,
}

/// Point-in-time view of the limiter, for monitoring endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    /// Number of keys currently tracked
    pub slots: usize,
    /// Total checks since start
    pub processed: u64,
    /// Total denied checks since start
    pub denied: u64,
}

impl Limiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the rate limit for a key at the current time.
    ///
    /// `max_rate` requests are admitted per `window`. A `max_rate` of zero
    /// denies everything; a zero `window` never rolls over.
    pub fn check(&self, key: &Key, max_rate: u64, window: Duration) -> Decision {
        self.check_at(key, max_rate, window, Instant::now())
    }

    /// Check the rate limit for a key as of `now`.
    ///
    /// The increment happens under the entry lock for `key`, so concurrent
    /// callers with the same key each observe a distinct count.
    pub fn check_at(&self, key: &Key, max_rate: u64, window: Duration, now: Instant) -> Decision {
        let (count, until_reset) = self.record(key, window, now);
        self.processed.fetch_add(1, Ordering::Relaxed);

        trace!(
            key = %key,
            count = count,
            max_rate = max_rate,
            "Checking rate limit"
        );

        if count <= max_rate {
            return Decision::Admit {
                count,
                remaining: max_rate - count,
            };
        }

        self.denied.fetch_add(1, Ordering::Relaxed);
        debug!(
            key = %key,
            count = count,
            max_rate = max_rate,
            retry_after_ms = until_reset.map(|d| d.as_millis() as u64),
            "Rate limit exceeded"
        );

        Decision::Deny {
            count,
            retry_after: until_reset,
        }
    }

    /// Hit the slot for `key`, creating it if needed.
    fn record(&self, key: &Key, window: Duration, now: Instant) -> (u64, Option<Duration>) {
        // Fast path avoids cloning the key for slots that already exist.
        if let Some(mut slot) = self.slots.get_mut(key) {
            let count = slot.hit(now, window);
            return (count, slot.duration_until_reset(now, window));
        }

        let mut slot = self.slots.entry(key.clone()).or_insert_with(|| {
            debug!(key = %key, "Creating new rate limit slot");
            Slot::new(now)
        });
        let count = slot.hit(now, window);
        (count, slot.duration_until_reset(now, window))
    }

    /// Evict every slot idle for longer than `max_idle`.
    ///
    /// Returns the number of slots removed. A key evicted while a check for
    /// it is in flight simply starts over with a fresh slot.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        self.sweep_at(max_idle, Instant::now())
    }

    /// Evict every slot idle for longer than `max_idle` as of `now`.
    pub fn sweep_at(&self, max_idle: Duration, now: Instant) -> usize {
        let mut evicted = 0;
        self.slots.retain(|key, slot| {
            if slot.is_idle(now, max_idle) {
                trace!(key = %key, "Evicting idle slot");
                evicted += 1;
                false
            } else {
                true
            }
        });

        if evicted > 0 {
            debug!(
                evicted = evicted,
                remaining = self.slots.len(),
                "Swept idle rate limit slots"
            );
        }
        evicted
    }

    /// Get the count recorded for a key in its latest window.
    ///
    /// Returns `None` if no slot exists for the key.
    pub fn count_for(&self, key: &Key) -> Option<u64> {
        self.slots.get(key).map(|slot| slot.count())
    }

    /// Get the number of tracked keys.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Sweep with `max_idle`, then report the number of tracked keys.
    pub fn live_slot_count(&self, max_idle: Duration) -> usize {
        self.sweep(max_idle);
        self.slot_count()
    }

    /// Get the total number of checks since the limiter was created.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Get the total number of denied checks.
    pub fn denied_count(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    /// Snapshot the counters.
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            slots: self.slot_count(),
            processed: self.processed_count(),
            denied: self.denied_count(),
        }
    }

    /// Drop all slots. The processed and denied totals are kept.
    pub fn clear(&self) {
        self.slots.clear();
    }
}

impl Admission for Limiter {
    fn check(&self, key: &Key, max_rate: u64, window: Duration) -> Decision {
        Limiter::check(self, key, max_rate, window)
    }
}
