//! Synthetic client load for exercising a limiter configuration.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use serde::Serialize;

use crate::config::LimitConfig;
use crate::ratelimit::{Admission, Key};

/// Shape of the load a single worker generates.
#[derive(Debug, Clone, Copy)]
pub struct LoadPlan {
    /// Checks issued by each worker
    pub requests_per_worker: usize,
    /// Size of the simulated client population
    pub distinct_clients: usize,
}

/// Admission outcomes counted by the load generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Checks that were admitted
    pub admitted: u64,
    /// Checks that were denied
    pub denied: u64,
}

impl Tally {
    /// Total checks issued.
    pub fn total(&self) -> u64 {
        self.admitted + self.denied
    }

    /// Add another tally into this one.
    pub fn merge(&mut self, other: Tally) {
        self.admitted += other.admitted;
        self.denied += other.denied;
    }
}

/// Key for simulated client number `index`.
///
/// Clients are spread over addresses and a handful of user agents, the way
/// real traffic from one address often comes from a few different browsers.
pub fn client_key(index: usize) -> Key {
    Key::new(
        0,
        format!("10.{}.{}.{}", (index >> 16) & 0xff, (index >> 8) & 0xff, index & 0xff),
        format!("loadgen/{}", index % 4),
    )
}

/// Issue `plan.requests_per_worker` checks against random clients.
///
/// Stops early once `stop` is set.
pub fn run_worker<R: Rng>(
    admission: &dyn Admission,
    limits: &LimitConfig,
    plan: LoadPlan,
    stop: &AtomicBool,
    rng: &mut R,
) -> Tally {
    let clients = plan.distinct_clients.max(1);
    let window = limits.window();
    let mut tally = Tally::default();

    for _ in 0..plan.requests_per_worker {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let key = client_key(rng.gen_range(0..clients));
        if admission.check(&key, limits.max_rate, window).is_admitted() {
            tally.admitted += 1;
        } else {
            tally.denied += 1;
        }
    }

    tally
}
