//! Transaction state.

use crate::error::{LedgerError, LedgerResult};
use crate::types::{Account, AccountId, TransactionId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Locks are being taken and writes staged.
    Active,
    /// Staged writes are being replicated.
    Committing,
    /// Every owner applied the writes.
    Committed,
    /// The transaction had no effect.
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "ACTIVE",
            Self::Committing => "COMMITTING",
            Self::Committed => "COMMITTED",
            Self::RolledBack => "ROLLED_BACK",
        };
        f.write_str(name)
    }
}

/// A transaction over a fixed set of locked keys.
///
/// Reads and writes are only allowed on keys the transaction holds. Reads
/// see the transaction's own staged writes, falling back to the committed
/// balance captured when the lock was granted. Nothing staged here is
/// visible outside the transaction until the coordinator commits it.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    held_locks: BTreeSet<AccountId>,
    /// Committed balances of held keys that existed when locked.
    working: BTreeMap<AccountId, i64>,
    pending_writes: BTreeMap<AccountId, i64>,
}

impl Transaction {
    /// Creates a new transaction.
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            held_locks: BTreeSet::new(),
            working: BTreeMap::new(),
            pending_writes: BTreeMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns the held keys in ascending order.
    pub fn held_locks(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.held_locks.iter().copied()
    }

    /// Checks whether the account exists, as seen by this transaction.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is not active or does not hold `key`.
    pub fn exists(&self, key: AccountId) -> LedgerResult<bool> {
        self.ensure_holds(key)?;
        Ok(self.pending_writes.contains_key(&key) || self.working.contains_key(&key))
    }

    /// Returns the balance of `key`, including staged writes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist, or
    /// `InvalidOperation` if `key` is not held.
    pub fn balance(&self, key: AccountId) -> LedgerResult<i64> {
        self.ensure_holds(key)?;
        self.pending_writes
            .get(&key)
            .or_else(|| self.working.get(&key))
            .copied()
            .ok_or(LedgerError::NotFound { id: key })
    }

    /// Stages a new balance for an existing account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist, or
    /// `InvalidOperation` if `key` is not held.
    pub fn set_balance(&mut self, key: AccountId, balance: i64) -> LedgerResult<()> {
        self.balance(key)?;
        self.pending_writes.insert(key, balance);
        Ok(())
    }

    /// Subtracts `amount` from the balance of `key`.
    ///
    /// # Errors
    ///
    /// Returns `BalanceOverflow` if the result does not fit in an `i64`.
    pub fn debit(&mut self, key: AccountId, amount: i64) -> LedgerResult<i64> {
        let balance = self
            .balance(key)?
            .checked_sub(amount)
            .ok_or(LedgerError::BalanceOverflow { id: key })?;
        self.set_balance(key, balance)?;
        Ok(balance)
    }

    /// Adds `amount` to the balance of `key`.
    ///
    /// # Errors
    ///
    /// Returns `BalanceOverflow` if the result does not fit in an `i64`.
    pub fn credit(&mut self, key: AccountId, amount: i64) -> LedgerResult<i64> {
        let balance = self
            .balance(key)?
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { id: key })?;
        self.set_balance(key, balance)?;
        Ok(balance)
    }

    /// Stages a new account with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the account exists, or
    /// `InvalidOperation` if `key` is not held.
    pub fn create(&mut self, key: AccountId) -> LedgerResult<()> {
        if self.exists(key)? {
            return Err(LedgerError::AlreadyExists { id: key });
        }
        self.pending_writes.insert(key, Account::opened(key).balance);
        Ok(())
    }

    /// Returns the staged writes.
    #[must_use]
    pub fn pending_writes(&self) -> &BTreeMap<AccountId, i64> {
        &self.pending_writes
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.pending_writes.len()
    }

    /// Records a granted lock and the committed account seen under it.
    pub(crate) fn hold(&mut self, key: AccountId, committed: Option<Account>) {
        self.held_locks.insert(key);
        if let Some(account) = committed {
            self.working.insert(key, account.balance);
        }
    }

    pub(crate) fn mark_committing(&mut self) -> LedgerResult<()> {
        self.ensure_active()?;
        self.state = TransactionState::Committing;
        Ok(())
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    /// Discards staged writes and working copies.
    pub(crate) fn mark_rolled_back(&mut self) {
        self.pending_writes.clear();
        self.working.clear();
        self.held_locks.clear();
        self.state = TransactionState::RolledBack;
    }

    fn ensure_holds(&self, key: AccountId) -> LedgerResult<()> {
        self.ensure_active()?;
        if self.held_locks.contains(&key) {
            Ok(())
        } else {
            Err(LedgerError::invalid_operation(format!(
                "{} does not hold the lock on {key}",
                self.id
            )))
        }
    }

    fn ensure_active(&self) -> LedgerResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committing => Err(LedgerError::invalid_operation(
                "transaction is committing",
            )),
            TransactionState::Committed => Err(LedgerError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::RolledBack => Err(LedgerError::invalid_operation(
                "transaction already rolled back",
            )),
        }
    }
}
