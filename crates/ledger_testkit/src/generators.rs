//! Property-based test generators using proptest.
//!
//! Provides strategies for account IDs, amounts, and transfer workloads.

use ledger_codec::{Account, AccountId};
use proptest::prelude::*;

/// A transfer to replay against a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOp {
    /// Account debited.
    pub from: AccountId,
    /// Account credited.
    pub to: AccountId,
    /// Amount moved; may be negative.
    pub amount: i64,
}

/// Strategy for any account ID, negative IDs included.
pub fn account_id_strategy() -> impl Strategy<Value = AccountId> {
    any::<i64>().prop_map(AccountId::new)
}

/// Strategy for account IDs in `0..count`.
pub fn bounded_account_id_strategy(count: i64) -> impl Strategy<Value = AccountId> {
    (0..count.max(1)).prop_map(AccountId::new)
}

/// Strategy for transfer amounts that cannot overflow in short workloads.
pub fn amount_strategy() -> impl Strategy<Value = i64> {
    -1_000_000i64..=1_000_000
}

/// Strategy for accounts with arbitrary balances.
pub fn account_strategy() -> impl Strategy<Value = Account> {
    (account_id_strategy(), any::<i64>()).prop_map(|(id, balance)| Account::new(id, balance))
}

/// Strategy for a transfer between accounts `0..accounts`.
pub fn transfer_strategy(accounts: i64) -> impl Strategy<Value = TransferOp> {
    (
        bounded_account_id_strategy(accounts),
        bounded_account_id_strategy(accounts),
        amount_strategy(),
    )
        .prop_map(|(from, to, amount)| TransferOp { from, to, amount })
}

/// Strategy for a sequence of transfers between accounts `0..accounts`.
pub fn transfer_sequence_strategy(
    accounts: i64,
    max_len: usize,
) -> impl Strategy<Value = Vec<TransferOp>> {
    prop::collection::vec(transfer_strategy(accounts), 1..=max_len.max(1))
}
