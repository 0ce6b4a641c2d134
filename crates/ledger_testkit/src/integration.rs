//! Cross-crate integration test helpers.
//!
//! [`LedgerHarness`] drives a ledger and keeps a plain model of the
//! balances it should hold, so tests can check every observable value
//! after arbitrary sequences of successes and failures.

use crate::fixtures::TestLedger;
use crate::generators::TransferOp;
use ledger_codec::decode_account;
use ledger_core::{AccountId, LedgerError, LedgerResult};
use std::collections::BTreeMap;

/// A test harness for integration testing.
pub struct LedgerHarness {
    /// The ledger under test.
    pub test_ledger: TestLedger,
    /// Expected committed balances.
    model: BTreeMap<AccountId, i64>,
}

impl LedgerHarness {
    /// Creates a harness over an empty replicated ledger.
    pub fn new(nodes: u32, factor: usize) -> Self {
        Self {
            test_ledger: TestLedger::replicated(nodes, factor),
            model: BTreeMap::new(),
        }
    }

    /// Creates an account, updating the model only on success.
    pub fn create(&mut self, id: AccountId) -> LedgerResult<()> {
        let result = self.test_ledger.create_account(id);
        if result.is_ok() {
            self.model.insert(id, 0);
        }
        result
    }

    /// Applies a transfer, updating the model only on success.
    ///
    /// Panics if the ledger accepts a transfer the model says must fail.
    pub fn transfer(&mut self, op: TransferOp) -> LedgerResult<()> {
        let result = self.test_ledger.perform_transfer(op.from, op.to, op.amount);

        let known = self.model.contains_key(&op.from) && self.model.contains_key(&op.to);
        match &result {
            Ok(()) => {
                assert!(known, "transfer between unknown accounts succeeded: {op:?}");
                if op.from != op.to {
                    *self.model.entry(op.from).or_default() -= op.amount;
                    *self.model.entry(op.to).or_default() += op.amount;
                }
            }
            Err(LedgerError::NotFound { id }) => {
                assert!(!self.model.contains_key(id), "{id} exists but was not found");
            }
            Err(_) => {}
        }
        result
    }

    /// Clears the ledger and the model.
    pub fn clear(&mut self) -> LedgerResult<()> {
        self.test_ledger.clear()?;
        self.model.clear();
        Ok(())
    }

    /// Returns the expected balance of `id`.
    pub fn expected(&self, id: AccountId) -> Option<i64> {
        self.model.get(&id).copied()
    }

    /// Checks every committed balance and every replica against the model.
    pub fn verify_all(&self) {
        let ledger = &self.test_ledger.ledger;
        assert_eq!(
            ledger.account_ids(),
            self.model.keys().copied().collect::<Vec<_>>(),
            "account sets differ"
        );

        for (id, balance) in &self.model {
            assert_eq!(
                ledger.get_balance(*id).expect("Failed to read balance"),
                *balance,
                "balance mismatch for {id}"
            );

            for node in ledger.owners(*id) {
                if node == ledger.local_node() {
                    continue;
                }
                let payload = self
                    .test_ledger
                    .cluster
                    .replica_payload(node, *id)
                    .unwrap_or_else(|| panic!("{node} is missing {id}"));
                let account = decode_account(&payload).expect("Failed to decode replica");
                assert_eq!(account.balance, *balance, "{node} holds a stale {id}");
            }
        }
    }
}
