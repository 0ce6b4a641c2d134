//! # Ledger Core
//!
//! Distributed transaction and locking layer for the replicated ledger.
//!
//! This crate provides:
//! - Key routing from account IDs to their owning nodes
//! - A lock manager granting exclusive, timeout-bounded key locks
//! - A replicated store with synchronous two-phase replication
//! - A transaction coordinator driving begin, lock, stage, replicate and
//!   commit or roll back
//! - The [`Ledger`] facade
//!
//! ## Guarantees
//!
//! - Multi-key transactions lock their keys in ascending order and so
//!   never deadlock
//! - A transfer moves both balances or neither
//! - Reads observe committed balances only
//! - A write is committed only once every owner of its key applied it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod ledger;
mod lock;
mod router;
mod stats;
mod store;
mod transaction;
mod types;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use lock::{Lock, LockManager, LockSet};
pub use router::KeyRouter;
pub use stats::{LedgerStats, StatsSnapshot};
pub use store::{ReplicaMismatch, ReplicatedStore};
pub use transaction::{Transaction, TransactionCoordinator, TransactionState};
pub use types::{Account, AccountId, NodeId, TransactionId};

pub use ledger_codec::SCHEMA_VERSION;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
