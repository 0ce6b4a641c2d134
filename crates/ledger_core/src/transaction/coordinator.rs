//! Transaction coordinator.

use crate::error::{LedgerError, LedgerResult};
use crate::lock::LockManager;
use crate::stats::LedgerStats;
use crate::store::ReplicatedStore;
use crate::transaction::state::Transaction;
use crate::types::{AccountId, TransactionId};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs multi-key transactions over the replicated store.
///
/// Every transaction follows the same protocol:
/// 1. Begin, state `ACTIVE`
/// 2. Optionally check the keys exist, without locks
/// 3. Lock all keys in ascending order
/// 4. Enter the clear gate, load committed balances under the locks,
///    check the keys still exist, and run the caller's work, which stages
///    writes
/// 5. State `COMMITTING`: replicate the staged writes to every owner
/// 6. State `COMMITTED`, then leave the gate and release the locks
///
/// A failure at any step moves the transaction to `ROLLED_BACK`, discards
/// its staged writes, releases its locks, and returns the error. Locks are
/// held in a [`crate::LockSet`] so release happens on every exit path.
///
/// ## Clear Gate
///
/// Transactions hold the gate shared from loading their working copies
/// until commit; [`TransactionCoordinator::clear`] holds it exclusively.
/// A clear therefore lands entirely before or entirely after each
/// transaction, and a transaction that loads after a clear sees its keys
/// as absent. The gate is entered after the key locks, and a clear takes
/// no key locks, so the two cannot wait on each other in a cycle.
pub struct TransactionCoordinator {
    locks: Arc<LockManager>,
    store: Arc<ReplicatedStore>,
    stats: Arc<LedgerStats>,
    next_txid: AtomicU64,
    active: Mutex<BTreeSet<TransactionId>>,
    clear_gate: RwLock<()>,
    lock_timeout: Duration,
}

impl TransactionCoordinator {
    /// Creates a coordinator.
    pub fn new(
        locks: Arc<LockManager>,
        store: Arc<ReplicatedStore>,
        stats: Arc<LedgerStats>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            locks,
            store,
            stats,
            next_txid: AtomicU64::new(1),
            active: Mutex::new(BTreeSet::new()),
            clear_gate: RwLock::new(()),
            lock_timeout,
        }
    }

    /// Returns the lock manager.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Returns the store.
    pub fn store(&self) -> &ReplicatedStore {
        &self.store
    }

    /// Returns the statistics counters.
    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    /// Returns the number of transactions that have begun and not finished.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Runs `f` as one atomic transaction over `keys`.
    ///
    /// `f` may read and stage writes only on `keys`. Its staged writes are
    /// replicated and made visible together, or not at all.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, `LockTimeout`, or `ReplicationFailure`.
    /// The transaction has rolled back whenever an error is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use ledger_core::{AccountId, Ledger};
    ///
    /// let ledger = Ledger::open_local().unwrap();
    /// let (a, b) = (AccountId::new(1), AccountId::new(2));
    /// ledger.create_account(a).unwrap();
    /// ledger.create_account(b).unwrap();
    ///
    /// ledger
    ///     .coordinator()
    ///     .execute([a, b], |txn| {
    ///         txn.set_balance(a, 10)?;
    ///         txn.set_balance(b, -10)?;
    ///         Ok(())
    ///     })
    ///     .unwrap();
    /// assert_eq!(ledger.get_balance(b).unwrap(), -10);
    /// ```
    pub fn execute<I, F, T>(&self, keys: I, f: F) -> LedgerResult<T>
    where
        I: IntoIterator<Item = AccountId>,
        F: FnOnce(&mut Transaction) -> LedgerResult<T>,
    {
        self.run(keys, &[], f)
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// The amount may be negative and balances may go below zero. A
    /// transfer from an account to itself changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if either account is absent, `BalanceOverflow`
    /// if a balance would leave the `i64` range, or any error of
    /// [`TransactionCoordinator::execute`].
    pub fn transfer(&self, from: AccountId, to: AccountId, amount: i64) -> LedgerResult<()> {
        self.run([from, to], &[from, to], |txn| {
            if from == to {
                txn.balance(from)?;
                return Ok(());
            }
            txn.debit(from, amount)?;
            txn.credit(to, amount)?;
            Ok(())
        })
    }

    /// Creates an account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the account is present.
    pub fn create_account(&self, id: AccountId) -> LedgerResult<()> {
        self.run([id], &[], |txn| txn.create(id))?;
        self.stats.record_account_created();
        Ok(())
    }

    /// Removes every account from every node.
    ///
    /// Waits up to the lock timeout for running transactions to leave the
    /// clear gate, and keeps new ones out until the clear is done.
    ///
    /// # Errors
    ///
    /// Returns `ClearTimeout` if transactions are still running when the
    /// wait ends, or `ClearFailure` if a node cannot be cleared.
    pub fn clear(&self) -> LedgerResult<()> {
        let Some(_gate) = self.clear_gate.try_write_for(self.lock_timeout) else {
            warn!(active = self.active_count(), "clear timed out waiting for transactions");
            return Err(LedgerError::ClearTimeout {
                waited: self.lock_timeout,
            });
        };
        debug!("clear gate closed");
        self.store.clear()
    }

    fn begin(&self) -> Transaction {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        self.active.lock().insert(txid);
        self.stats.record_transaction_start();
        debug!(%txid, "transaction begun");
        Transaction::new(txid)
    }

    fn run<I, F, T>(&self, keys: I, must_exist: &[AccountId], f: F) -> LedgerResult<T>
    where
        I: IntoIterator<Item = AccountId>,
        F: FnOnce(&mut Transaction) -> LedgerResult<T>,
    {
        let mut txn = self.begin();
        let result = self.drive(&mut txn, keys, must_exist, f);

        match &result {
            Ok(_) => self.stats.record_transaction_commit(),
            Err(e) => self.roll_back(&mut txn, e),
        }
        self.active.lock().remove(&txn.id());
        result
    }

    fn drive<I, F, T>(
        &self,
        txn: &mut Transaction,
        keys: I,
        must_exist: &[AccountId],
        f: F,
    ) -> LedgerResult<T>
    where
        I: IntoIterator<Item = AccountId>,
        F: FnOnce(&mut Transaction) -> LedgerResult<T>,
    {
        // Cheap early exit; the authoritative check runs under the locks.
        if let Some(id) = must_exist.iter().find(|id| !self.store.contains_key(**id)) {
            return Err(LedgerError::NotFound { id: *id });
        }

        let locks = self
            .locks
            .acquire_ordered(keys, txn.id(), self.lock_timeout)?;
        let gate = self.clear_gate.read();
        for key in locks.keys() {
            let committed = match self.store.get(*key) {
                Ok(account) => Some(account),
                Err(LedgerError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            txn.hold(*key, committed);
        }
        // A clear may have run between the unlocked check and the locks.
        for id in must_exist {
            if !txn.exists(*id)? {
                return Err(LedgerError::NotFound { id: *id });
            }
        }

        let value = f(txn)?;

        txn.mark_committing()?;
        debug!(txid = %txn.id(), writes = txn.write_count(), "transaction committing");
        if txn.write_count() > 0 {
            self.store.commit(txn.id(), txn.pending_writes())?;
        }
        txn.mark_committed();
        debug!(txid = %txn.id(), "transaction committed");

        drop(gate);
        drop(locks);
        Ok(value)
    }

    fn roll_back(&self, txn: &mut Transaction, error: &LedgerError) {
        match error {
            LedgerError::LockTimeout { .. } => self.stats.record_lock_timeout(),
            LedgerError::ReplicationFailure { .. } => self.stats.record_replication_failure(),
            _ => {}
        }
        self.stats.record_transaction_rollback();

        let from = txn.state();
        txn.mark_rolled_back();
        match error {
            LedgerError::NotFound { .. } | LedgerError::AlreadyExists { .. } => {
                debug!(txid = %txn.id(), %from, %error, "transaction rolled back");
            }
            _ => warn!(txid = %txn.id(), %from, %error, "transaction rolled back"),
        }
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("next_txid", &self.next_txid.load(Ordering::SeqCst))
            .field("active", &self.active_count())
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}
