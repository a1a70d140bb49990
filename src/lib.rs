//! Gatekeeper - In-process Request Admission Control
//!
//! This crate decides, per client identity, whether an incoming request may
//! proceed within a fixed time window. Per-key state lives in a sharded
//! concurrent map and is bounded by periodically sweeping idle keys.
//!
//! ```
//! use std::time::Duration;
//! use gatekeeper::ratelimit::{Key, Limiter};
//!
//! let limiter = Limiter::new();
//! let key = Key::new(1, "10.0.0.1", "curl/8.0");
//!
//! assert!(limiter.check(&key, 2, Duration::from_secs(1)).is_admitted());
//! assert!(limiter.check(&key, 2, Duration::from_secs(1)).is_admitted());
//! assert!(!limiter.check(&key, 2, Duration::from_secs(1)).is_admitted());
//! ```

pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod ratelimit;
pub mod sweeper;
