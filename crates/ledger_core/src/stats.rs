//! Ledger statistics.
//!
//! Counters are atomic and may be read while transactions are running.
//!
//! ```
//! use ledger_core::{AccountId, Ledger};
//!
//! let ledger = Ledger::open_local().unwrap();
//! ledger.create_account(AccountId::new(1)).unwrap();
//!
//! let stats = ledger.stats();
//! assert_eq!(stats.accounts_created, 1);
//! assert_eq!(stats.transactions_committed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Ledger statistics.
#[derive(Debug, Default)]
pub struct LedgerStats {
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_rolled_back: AtomicU64,
    lock_timeouts: AtomicU64,
    replication_failures: AtomicU64,
    accounts_created: AtomicU64,
}

impl LedgerStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_timeout(&self) {
        self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replication_failure(&self) {
        self.replication_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_account_created(&self) {
        self.accounts_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of committed transactions.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled back transactions.
    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of lock acquisitions that timed out.
    pub fn lock_timeouts(&self) -> u64 {
        self.lock_timeouts.load(Ordering::Relaxed)
    }

    /// Returns the number of writes a replica failed to acknowledge.
    pub fn replication_failures(&self) -> u64 {
        self.replication_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of accounts created since the ledger was built.
    ///
    /// Not reduced by `clear`.
    pub fn accounts_created(&self) -> u64 {
        self.accounts_created.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_rolled_back: self.transactions_rolled_back(),
            lock_timeouts: self.lock_timeouts(),
            replication_failures: self.replication_failures(),
            accounts_created: self.accounts_created(),
        }
    }
}

/// A point-in-time copy of [`LedgerStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_rolled_back: u64,
    /// Lock acquisitions that timed out.
    pub lock_timeouts: u64,
    /// Writes a replica failed to acknowledge.
    pub replication_failures: u64,
    /// Accounts created.
    pub accounts_created: u64,
}

impl StatsSnapshot {
    /// Returns transactions that have finished either way.
    #[must_use]
    pub fn transactions_finished(&self) -> u64 {
        self.transactions_committed + self.transactions_rolled_back
    }
}
