//! Ledger facade.

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::lock::LockManager;
use crate::router::KeyRouter;
use crate::stats::{LedgerStats, StatsSnapshot};
use crate::store::{ReplicaMismatch, ReplicatedStore};
use crate::transaction::TransactionCoordinator;
use crate::types::{AccountId, NodeId};
use ledger_cluster::{ClusterConfig, InMemoryCluster, Membership, ReplicaTransport};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// The ledger handle.
///
/// `Ledger` is the entry point for account operations. It owns the lock
/// manager, the replicated store and the transaction coordinator for one
/// node, and is shared across threads by reference or `Arc`.
///
/// Locks live in this handle, so the node that opened it is the only
/// coordinator: every transfer on a cluster must go through the same
/// `Ledger`. Another node's `Ledger` over the same replicas would not be
/// excluded by these locks.
///
/// A ledger is built closed. [`Ledger::open`] joins the cluster and
/// [`Ledger::close`] leaves it; account operations on a closed ledger fail
/// with `LedgerClosed`.
///
/// # Example
///
/// ```
/// use ledger_core::{AccountId, Ledger};
///
/// let ledger = Ledger::open_in_memory(3, 2).unwrap();
/// let (a, b) = (AccountId::new(1), AccountId::new(2));
/// ledger.create_account(a).unwrap();
/// ledger.create_account(b).unwrap();
///
/// ledger.perform_transfer(a, b, 100).unwrap();
/// assert_eq!(ledger.get_balance(a).unwrap(), -100);
/// assert_eq!(ledger.get_balance(b).unwrap(), 100);
///
/// ledger.close().unwrap();
/// ```
pub struct Ledger {
    config: LedgerConfig,
    membership: Arc<dyn Membership>,
    coordinator: TransactionCoordinator,
    is_open: RwLock<bool>,
}

impl Ledger {
    /// Builds a closed ledger over a cluster.
    pub fn new(
        config: LedgerConfig,
        membership: Arc<dyn Membership>,
        transport: Arc<dyn ReplicaTransport>,
    ) -> Self {
        let router = KeyRouter::new(Arc::clone(&membership), config.replication_factor);
        let store = ReplicatedStore::new(router, transport, config.replication_timeout);
        let coordinator = TransactionCoordinator::new(
            Arc::new(LockManager::new()),
            Arc::new(store),
            Arc::new(LedgerStats::new()),
            config.lock_timeout,
        );

        Self {
            config,
            membership,
            coordinator,
            is_open: RwLock::new(false),
        }
    }

    /// Builds a closed ledger over an in-process cluster.
    pub fn with_cluster(config: LedgerConfig, cluster: Arc<InMemoryCluster>) -> Self {
        Self::new(config, cluster.clone(), cluster)
    }

    /// Opens a ledger on a fresh in-process cluster of `nodes` nodes.
    ///
    /// # Errors
    ///
    /// Returns `Cluster` if joining fails.
    pub fn open_in_memory(nodes: u32, replication_factor: usize) -> LedgerResult<Self> {
        let cluster = Arc::new(InMemoryCluster::new(ClusterConfig::new(nodes)));
        let config = LedgerConfig::default().replication_factor(replication_factor);
        let ledger = Self::with_cluster(config, cluster);
        ledger.open()?;
        Ok(ledger)
    }

    /// Opens a single-node ledger with no replicas.
    ///
    /// # Errors
    ///
    /// Returns `Cluster` if joining fails.
    pub fn open_local() -> LedgerResult<Self> {
        Self::open_in_memory(1, 1)
    }

    /// Joins the cluster. Opening an open ledger does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Cluster` if the membership refuses the join.
    pub fn open(&self) -> LedgerResult<()> {
        let mut is_open = self.is_open.write();
        if *is_open {
            return Ok(());
        }
        self.membership.join().map_err(LedgerError::Cluster)?;
        *is_open = true;
        info!(
            node = %self.local_node(),
            members = self.membership.members().len(),
            replication_factor = self.config.replication_factor,
            "ledger opened"
        );
        Ok(())
    }

    /// Leaves the cluster. Closing a closed ledger does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Cluster` if the membership refuses the leave.
    pub fn close(&self) -> LedgerResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.membership.leave().map_err(LedgerError::Cluster)?;
        *is_open = false;
        info!(node = %self.local_node(), "ledger closed");
        Ok(())
    }

    /// Checks if the ledger is open.
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> LedgerResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(LedgerError::LedgerClosed)
        }
    }

    /// Creates an account with a zero balance.
    ///
    /// Locks only `id`, so it never takes part in multi-key lock waits.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the account is present.
    pub fn create_account(&self, id: AccountId) -> LedgerResult<()> {
        self.ensure_open()?;
        self.coordinator.create_account(id)
    }

    /// Returns the committed balance of `id`.
    ///
    /// Takes no lock. Balances staged by in-flight transactions are never
    /// visible.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account is absent.
    pub fn get_balance(&self, id: AccountId) -> LedgerResult<i64> {
        self.ensure_open()?;
        self.coordinator.store().get(id).map(|account| account.balance)
    }

    /// Atomically moves `amount` from `from` to `to`.
    ///
    /// Any amount is accepted and balances may go negative. On error
    /// neither balance has changed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `LockTimeout`, `ReplicationFailure` or
    /// `BalanceOverflow`.
    pub fn perform_transfer(&self, from: AccountId, to: AccountId, amount: i64) -> LedgerResult<()> {
        self.ensure_open()?;
        self.coordinator.transfer(from, to, amount)
    }

    /// Removes every account on every node.
    ///
    /// Waits for running transactions to commit or roll back, so a transfer
    /// racing a clear either completes first or fails with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `ClearTimeout` if transactions are still running after the
    /// lock timeout, or `ClearFailure` if any node cannot be cleared.
    pub fn clear(&self) -> LedgerResult<()> {
        self.ensure_open()?;
        self.coordinator.clear()
    }

    /// Returns the committed account IDs in ascending order.
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.coordinator.store().keys()
    }

    /// Returns the number of accounts.
    pub fn account_count(&self) -> usize {
        self.coordinator.store().len()
    }

    /// Returns the sum of all committed balances.
    ///
    /// Transfers conserve this value, so it only changes through `clear`.
    pub fn total_balance(&self) -> i128 {
        self.coordinator.store().total_balance()
    }

    /// Compares every replica with the committed view.
    ///
    /// An empty result means every owner of every key holds the same
    /// account.
    ///
    /// # Errors
    ///
    /// Returns `ReplicationFailure` if a replica cannot be read.
    pub fn verify_replicas(&self) -> LedgerResult<Vec<ReplicaMismatch>> {
        self.ensure_open()?;
        self.coordinator.store().verify_replicas()
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.coordinator.stats().snapshot()
    }

    /// Returns the local node.
    pub fn local_node(&self) -> NodeId {
        self.membership.local_node()
    }

    /// Returns the owners of `id`.
    pub fn owners(&self, id: AccountId) -> Vec<NodeId> {
        self.coordinator.store().router().owners(id)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Returns the transaction coordinator.
    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    /// Returns the lock manager.
    pub fn lock_manager(&self) -> &LockManager {
        self.coordinator.locks()
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("local_node", &self.local_node())
            .field("is_open", &self.is_open())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: i64) -> AccountId {
        AccountId::new(k)
    }

    #[test]
    fn open_local_is_open() {
        let ledger = Ledger::open_local().unwrap();
        assert!(ledger.is_open());
        assert_eq!(ledger.owners(key(5)), vec![NodeId(0)]);
    }

    #[test]
    fn built_ledger_starts_closed() {
        let cluster = Arc::new(InMemoryCluster::single_node());
        let ledger = Ledger::with_cluster(LedgerConfig::default(), cluster.clone());

        assert!(!ledger.is_open());
        assert!(!cluster.is_joined());
        assert_eq!(ledger.create_account(key(1)), Err(LedgerError::LedgerClosed));

        ledger.open().unwrap();
        assert!(cluster.is_joined());
        ledger.create_account(key(1)).unwrap();
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let ledger = Ledger::open_local().unwrap();
        ledger.open().unwrap();
        ledger.close().unwrap();
        ledger.close().unwrap();
        assert!(!ledger.is_open());
    }

    #[test]
    fn closed_ledger_rejects_operations() {
        let ledger = Ledger::open_local().unwrap();
        ledger.create_account(key(1)).unwrap();
        ledger.close().unwrap();

        assert_eq!(ledger.get_balance(key(1)), Err(LedgerError::LedgerClosed));
        assert_eq!(
            ledger.perform_transfer(key(1), key(1), 1),
            Err(LedgerError::LedgerClosed)
        );
        assert_eq!(ledger.clear(), Err(LedgerError::LedgerClosed));

        ledger.open().unwrap();
        assert_eq!(ledger.get_balance(key(1)).unwrap(), 0);
    }

    #[test]
    fn drop_leaves_cluster() {
        let cluster = Arc::new(InMemoryCluster::single_node());
        {
            let ledger = Ledger::with_cluster(LedgerConfig::default(), cluster.clone());
            ledger.open().unwrap();
            assert!(cluster.is_joined());
        }
        assert!(!cluster.is_joined());
    }

    #[test]
    fn clear_removes_accounts() {
        let ledger = Ledger::open_in_memory(3, 2).unwrap();
        for id in 0..10 {
            ledger.create_account(key(id)).unwrap();
        }
        assert_eq!(ledger.account_count(), 10);

        ledger.clear().unwrap();
        assert_eq!(ledger.account_count(), 0);
        assert_eq!(ledger.get_balance(key(3)), Err(LedgerError::NotFound { id: key(3) }));
        ledger.create_account(key(3)).unwrap();
    }

    #[test]
    fn stats_track_operations() {
        let ledger = Ledger::open_local().unwrap();
        ledger.create_account(key(1)).unwrap();
        ledger.create_account(key(2)).unwrap();
        ledger.perform_transfer(key(1), key(2), 5).unwrap();
        let _ = ledger.perform_transfer(key(1), key(9), 5);

        let stats = ledger.stats();
        assert_eq!(stats.accounts_created, 2);
        assert_eq!(stats.transactions_committed, 3);
        assert_eq!(stats.transactions_rolled_back, 1);
    }
}
