//! Pessimistic per-key lock table.

use crate::error::{LedgerError, LedgerResult};
use crate::lock::guard::LockSet;
use crate::types::{AccountId, TransactionId};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A granted lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    /// The locked key.
    pub key: AccountId,
    /// The transaction holding the key.
    pub holder: TransactionId,
    /// When the lock was granted.
    pub acquired_at: Instant,
}

/// Grants exclusive, timeout-bounded locks on account keys.
///
/// A key is either free or held by exactly one transaction. Waiters block
/// on a shared condition variable that is signalled on every release.
///
/// ## Deadlock Freedom
///
/// Multi-key callers go through [`LockManager::acquire_ordered`], which
/// sorts the keys ascending before taking any of them. With every
/// transaction acquiring in the same total order, a transaction waiting
/// on key `k` holds only keys smaller than `k`, so the wait-for graph
/// cannot contain a cycle.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<AccountId, Lock>>,
    released: Condvar,
}

impl LockManager {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires `key` for `txid`, waiting at most `timeout`.
    ///
    /// Acquiring a key the transaction already holds succeeds immediately.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if another transaction still holds the key
    /// when the timeout expires.
    pub fn acquire(
        &self,
        key: AccountId,
        txid: TransactionId,
        timeout: Duration,
    ) -> LedgerResult<()> {
        let start = Instant::now();
        let deadline = start.checked_add(timeout);
        let mut table = self.table.lock();

        loop {
            let holder = match table.get(&key) {
                None => {
                    table.insert(
                        key,
                        Lock {
                            key,
                            holder: txid,
                            acquired_at: Instant::now(),
                        },
                    );
                    debug!(%key, %txid, "lock granted");
                    return Ok(());
                }
                Some(lock) if lock.holder == txid => return Ok(()),
                Some(lock) => lock.holder,
            };

            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    let waited = start.elapsed();
                    warn!(%key, %txid, %holder, ?waited, "lock acquisition timed out");
                    return Err(LedgerError::LockTimeout {
                        key,
                        holder,
                        waited,
                    });
                }
                Some(deadline) => {
                    self.released.wait_until(&mut table, deadline);
                }
                None => self.released.wait(&mut table),
            }
        }
    }

    /// Acquires every key in ascending key order.
    ///
    /// Duplicate keys are acquired once. The caller's ordering of `keys`
    /// has no effect on the acquisition order. If any key times out, the
    /// keys already taken are released before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` for the first key that could not be acquired.
    pub fn acquire_ordered<I>(
        &self,
        keys: I,
        txid: TransactionId,
        timeout: Duration,
    ) -> LedgerResult<LockSet<'_>>
    where
        I: IntoIterator<Item = AccountId>,
    {
        let ordered: BTreeSet<AccountId> = keys.into_iter().collect();
        let mut set = LockSet::new(self, txid);

        for key in ordered {
            // On error `set` drops and releases what was taken so far.
            self.acquire(key, txid, timeout)?;
            set.push(key);
        }

        Ok(set)
    }

    /// Releases `key` if `txid` holds it.
    ///
    /// Returns false, and changes nothing, if the key is free or held by a
    /// different transaction.
    pub fn release(&self, key: AccountId, txid: TransactionId) -> bool {
        let mut table = self.table.lock();
        let held = table.get(&key).is_some_and(|lock| lock.holder == txid);
        if held {
            table.remove(&key);
            drop(table);
            self.released.notify_all();
            debug!(%key, %txid, "lock released");
        }
        held
    }

    /// Returns the lock on `key`, if held.
    pub fn lock_on(&self, key: AccountId) -> Option<Lock> {
        self.table.lock().get(&key).copied()
    }

    /// Returns the transaction holding `key`, if any.
    pub fn holder(&self, key: AccountId) -> Option<TransactionId> {
        self.lock_on(key).map(|lock| lock.holder)
    }

    /// Returns the number of held locks.
    pub fn held_count(&self) -> usize {
        self.table.lock().len()
    }
}
