//! Rate limiting logic and state management.

mod admission;
mod decision;
mod key;
mod limiter;
mod slot;

pub use admission::Admission;
pub use decision::Decision;
pub use key::Key;
pub use limiter::{Limiter, LimiterStats};
