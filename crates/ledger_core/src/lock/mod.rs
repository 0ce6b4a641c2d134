//! Pessimistic locking with deterministic ordering.

mod guard;
mod manager;

pub use guard::LockSet;
pub use manager::{Lock, LockManager};
