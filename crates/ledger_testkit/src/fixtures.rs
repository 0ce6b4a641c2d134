//! Test fixtures and ledger helpers.
//!
//! Provides ready-to-use ledgers with optional pre-created accounts and
//! a handle on the in-process cluster for fault injection.

use ledger_cluster::{ClusterConfig, InMemoryCluster};
use ledger_core::{AccountId, Ledger, LedgerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Number of accounts in the standard bank fixture.
pub const BANK_ACCOUNTS: i64 = 1_000;

/// A test ledger with its cluster.
pub struct TestLedger {
    /// The ledger instance.
    pub ledger: Arc<Ledger>,
    /// The cluster the ledger replicates to.
    pub cluster: Arc<InMemoryCluster>,
}

impl TestLedger {
    /// Creates an open single-node ledger.
    pub fn local() -> Self {
        Self::replicated(1, 1)
    }

    /// Creates an open ledger on `nodes` nodes with `factor` owners per key.
    pub fn replicated(nodes: u32, factor: usize) -> Self {
        let config = LedgerConfig::new()
            .replication_factor(factor)
            .lock_timeout(Duration::from_secs(5))
            .replication_timeout(Duration::from_secs(1));
        Self::with_config(ClusterConfig::new(nodes), config)
    }

    /// Creates an open ledger from explicit configuration.
    pub fn with_config(cluster_config: ClusterConfig, config: LedgerConfig) -> Self {
        let cluster = Arc::new(InMemoryCluster::new(cluster_config));
        let ledger = Ledger::with_cluster(config, Arc::clone(&cluster));
        ledger.open().expect("Failed to open ledger");
        Self {
            ledger: Arc::new(ledger),
            cluster,
        }
    }

    /// Creates accounts `0..count`.
    pub fn with_accounts(self, count: i64) -> Self {
        for id in 0..count {
            self.ledger
                .create_account(AccountId::new(id))
                .expect("Failed to create account");
        }
        self
    }

    /// Returns a shareable handle on the ledger.
    pub fn shared(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    /// Returns every balance of accounts `0..count`, in ID order.
    pub fn balances(&self, count: i64) -> Vec<i64> {
        (0..count)
            .map(|id| {
                self.ledger
                    .get_balance(AccountId::new(id))
                    .expect("Failed to read balance")
            })
            .collect()
    }

    /// Asserts the ledger is internally consistent.
    ///
    /// Checks that money was conserved and that every replica agrees with
    /// the committed view.
    pub fn assert_consistent(&self) {
        assert_eq!(self.ledger.total_balance(), 0, "money was created or lost");
        let mismatches = self
            .ledger
            .verify_replicas()
            .expect("Failed to read replicas");
        assert!(mismatches.is_empty(), "replicas diverged: {mismatches:?}");
    }
}

impl std::ops::Deref for TestLedger {
    type Target = Ledger;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}

/// Runs a test with a temporary single-node ledger.
///
/// # Example
///
/// ```
/// use ledger_core::AccountId;
/// use ledger_testkit::with_local_ledger;
///
/// with_local_ledger(|ledger| {
///     ledger.create_account(AccountId::new(1)).unwrap();
///     assert_eq!(ledger.get_balance(AccountId::new(1)).unwrap(), 0);
/// });
/// ```
pub fn with_local_ledger<F, R>(f: F) -> R
where
    F: FnOnce(&Ledger) -> R,
{
    let test_ledger = TestLedger::local();
    f(&test_ledger.ledger)
}

/// Runs a test with a temporary replicated ledger.
pub fn with_replicated_ledger<F, R>(nodes: u32, factor: usize, f: F) -> R
where
    F: FnOnce(&Ledger, &InMemoryCluster) -> R,
{
    let test_ledger = TestLedger::replicated(nodes, factor);
    f(&test_ledger.ledger, &test_ledger.cluster)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A single-node bank with [`BANK_ACCOUNTS`] empty accounts.
    pub fn bank() -> TestLedger {
        TestLedger::local().with_accounts(BANK_ACCOUNTS)
    }

    /// A three-node bank, two owners per key, with [`BANK_ACCOUNTS`]
    /// empty accounts.
    pub fn replicated_bank() -> TestLedger {
        TestLedger::replicated(3, 2).with_accounts(BANK_ACCOUNTS)
    }

    /// A ledger where every key is owned by every one of `nodes` nodes.
    pub fn fully_replicated(nodes: u32, accounts: i64) -> TestLedger {
        TestLedger::replicated(nodes, nodes as usize).with_accounts(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ledger() {
        let test_ledger = TestLedger::local();
        assert!(test_ledger.is_open());
        assert_eq!(test_ledger.account_count(), 0);
    }

    #[test]
    fn test_with_accounts() {
        let test_ledger = TestLedger::replicated(3, 2).with_accounts(10);
        assert_eq!(test_ledger.account_count(), 10);
        assert_eq!(test_ledger.balances(10), vec![0; 10]);
        test_ledger.assert_consistent();
    }

    #[test]
    fn test_with_replicated_ledger() {
        with_replicated_ledger(4, 2, |ledger, cluster| {
            ledger.create_account(AccountId::new(1)).unwrap();
            assert_eq!(cluster.replica_keys(ledger_cluster::NodeId(1)).len(), 1);
        });
    }

    #[test]
    fn test_bank_scenario() {
        let bank = scenarios::bank();
        assert_eq!(bank.account_count(), BANK_ACCOUNTS as usize);
    }
}
