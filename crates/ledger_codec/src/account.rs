//! Account entity and identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an account.
///
/// Account IDs are caller-chosen integers. Negative values are valid
/// identifiers; ordering is the plain integer order, which is also the
/// order locks are acquired in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Creates a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// An account and its balance.
///
/// Copies of an `Account` outside the store are working copies; the
/// replicated store owns the authoritative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Current balance. May be negative.
    pub balance: i64,
}

impl Account {
    /// Creates an account with the given balance.
    #[must_use]
    pub const fn new(id: AccountId, balance: i64) -> Self {
        Self { id, balance }
    }

    /// Creates an account with a zero balance.
    #[must_use]
    pub const fn opened(id: AccountId) -> Self {
        Self { id, balance: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_ordering_is_numeric() {
        assert!(AccountId::new(-5) < AccountId::new(0));
        assert!(AccountId::new(2) < AccountId::new(10));
    }

    #[test]
    fn account_id_display() {
        assert_eq!(AccountId::new(42).to_string(), "acct:42");
    }

    #[test]
    fn opened_account_has_zero_balance() {
        let account = Account::opened(AccountId::new(7));
        assert_eq!(account.balance, 0);
        assert_eq!(account.id, AccountId::new(7));
    }
}
