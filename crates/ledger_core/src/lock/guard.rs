//! Scoped ownership of a set of locks.

use crate::lock::manager::LockManager;
use crate::types::{AccountId, TransactionId};

/// Locks held by one transaction, released when dropped.
///
/// Keys are recorded in acquisition order, which is ascending key order
/// when the set comes from [`LockManager::acquire_ordered`].
#[derive(Debug)]
pub struct LockSet<'a> {
    manager: &'a LockManager,
    txid: TransactionId,
    keys: Vec<AccountId>,
}

impl<'a> LockSet<'a> {
    pub(crate) fn new(manager: &'a LockManager, txid: TransactionId) -> Self {
        Self {
            manager,
            txid,
            keys: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, key: AccountId) {
        self.keys.push(key);
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        self.txid
    }

    /// Returns the held keys in acquisition order.
    #[must_use]
    pub fn keys(&self) -> &[AccountId] {
        &self.keys
    }

    /// Checks whether `key` is held.
    #[must_use]
    pub fn contains(&self, key: AccountId) -> bool {
        self.keys.contains(&key)
    }

    /// Releases every key now rather than at scope end.
    pub fn release(self) {}
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        for key in self.keys.drain(..).rev() {
            self.manager.release(key, self.txid);
        }
    }
}
