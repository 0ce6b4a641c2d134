//! Atomic multi-key transactions.
//!
//! Transactions are pessimistic: every key is locked, in ascending order,
//! before anything is read. Staged writes become visible only after every
//! replica has applied them, so readers see committed balances only.

mod coordinator;
mod state;

pub use coordinator::TransactionCoordinator;
pub use state::{Transaction, TransactionState};
