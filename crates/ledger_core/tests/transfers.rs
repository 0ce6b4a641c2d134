//! End-to-end transfer behavior across a replicated cluster.

use ledger_cluster::{ClusterConfig, InMemoryCluster, NodeId};
use ledger_core::{AccountId, Ledger, LedgerConfig, LedgerError, TransactionId};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn key(k: i64) -> AccountId {
    AccountId::new(k)
}

fn open_cluster(nodes: u32, factor: usize) -> (Arc<InMemoryCluster>, Ledger) {
    let cluster = Arc::new(InMemoryCluster::new(ClusterConfig::new(nodes)));
    let config = LedgerConfig::new()
        .replication_factor(factor)
        .lock_timeout(Duration::from_millis(100))
        .replication_timeout(Duration::from_millis(200));
    let ledger = Ledger::with_cluster(config, cluster.clone());
    ledger.open().unwrap();
    (cluster, ledger)
}

fn open_with_accounts(nodes: u32, factor: usize, count: i64) -> (Arc<InMemoryCluster>, Ledger) {
    let (cluster, ledger) = open_cluster(nodes, factor);
    for id in 1..=count {
        ledger.create_account(key(id)).unwrap();
    }
    (cluster, ledger)
}

#[test]
fn transfer_from_empty_account_goes_negative() {
    let (_, ledger) = open_with_accounts(3, 2, 2);

    ledger.perform_transfer(key(1), key(2), 100).unwrap();

    assert_eq!(ledger.get_balance(key(1)).unwrap(), -100);
    assert_eq!(ledger.get_balance(key(2)).unwrap(), 100);
    assert_eq!(ledger.total_balance(), 0);
    assert!(ledger.verify_replicas().unwrap().is_empty());
}

#[test]
fn new_accounts_start_at_zero() {
    let (_, ledger) = open_with_accounts(3, 2, 5);
    for id in 1..=5 {
        assert_eq!(ledger.get_balance(key(id)).unwrap(), 0);
    }
    assert_eq!(ledger.account_ids(), (1..=5).map(key).collect::<Vec<_>>());
}

#[test]
fn duplicate_create_fails() {
    let (_, ledger) = open_with_accounts(3, 2, 1);
    assert_eq!(
        ledger.create_account(key(1)),
        Err(LedgerError::AlreadyExists { id: key(1) })
    );
    assert_eq!(ledger.account_count(), 1);
}

#[test]
fn unknown_accounts_are_not_found() {
    let (_, ledger) = open_with_accounts(3, 2, 1);

    assert_eq!(
        ledger.get_balance(key(42)),
        Err(LedgerError::NotFound { id: key(42) })
    );
    assert_eq!(
        ledger.perform_transfer(key(1), key(42), 5),
        Err(LedgerError::NotFound { id: key(42) })
    );
    assert_eq!(
        ledger.perform_transfer(key(42), key(1), 5),
        Err(LedgerError::NotFound { id: key(42) })
    );
    assert_eq!(ledger.get_balance(key(1)).unwrap(), 0);
}

#[test]
fn negative_amount_moves_the_other_way() {
    let (_, ledger) = open_with_accounts(2, 2, 2);
    ledger.perform_transfer(key(1), key(2), -30).unwrap();
    assert_eq!(ledger.get_balance(key(1)).unwrap(), 30);
    assert_eq!(ledger.get_balance(key(2)).unwrap(), -30);
}

#[test]
fn lock_timeout_leaves_balances_untouched() {
    let (_, ledger) = open_with_accounts(3, 2, 2);
    ledger.perform_transfer(key(1), key(2), 10).unwrap();

    // Another transaction holds the larger key.
    let holder = TransactionId::new(u64::MAX);
    ledger
        .lock_manager()
        .acquire(key(2), holder, Duration::ZERO)
        .unwrap();

    let result = ledger.perform_transfer(key(1), key(2), 50);
    assert!(matches!(result, Err(LedgerError::LockTimeout { key: k, .. }) if k == key(2)));
    assert!(result.unwrap_err().is_transient());

    assert_eq!(ledger.get_balance(key(1)).unwrap(), -10);
    assert_eq!(ledger.get_balance(key(2)).unwrap(), 10);
    assert_eq!(ledger.lock_manager().holder(key(1)), None);

    ledger.lock_manager().release(key(2), holder);
    ledger.perform_transfer(key(1), key(2), 50).unwrap();
    assert_eq!(ledger.get_balance(key(2)).unwrap(), 60);
}

#[test]
fn partitioned_replica_rolls_back_transfer() {
    let (cluster, ledger) = open_with_accounts(3, 3, 2);
    ledger.perform_transfer(key(1), key(2), 7).unwrap();

    cluster.partition(NodeId(2));
    let result = ledger.perform_transfer(key(1), key(2), 100);
    assert!(matches!(
        result,
        Err(LedgerError::ReplicationFailure { node: NodeId(2), .. })
    ));

    assert_eq!(ledger.get_balance(key(1)).unwrap(), -7);
    assert_eq!(ledger.get_balance(key(2)).unwrap(), 7);
    assert_eq!(ledger.lock_manager().held_count(), 0);

    cluster.heal(NodeId(2));
    assert!(ledger.verify_replicas().unwrap().is_empty());
    ledger.perform_transfer(key(1), key(2), 100).unwrap();
    assert_eq!(ledger.get_balance(key(2)).unwrap(), 107);
}

#[test]
fn refused_commit_restores_replicas() {
    let (cluster, ledger) = open_with_accounts(3, 3, 2);
    cluster.reject_commits(NodeId(2), true);

    let result = ledger.perform_transfer(key(1), key(2), 25);
    assert!(matches!(result, Err(LedgerError::ReplicationFailure { .. })));
    assert_eq!(ledger.get_balance(key(1)).unwrap(), 0);
    assert_eq!(ledger.get_balance(key(2)).unwrap(), 0);

    cluster.reject_commits(NodeId(2), false);
    assert!(ledger.verify_replicas().unwrap().is_empty());
    assert_eq!(ledger.stats().replication_failures, 1);
}

#[test]
fn create_on_partitioned_owner_fails_cleanly() {
    let (cluster, ledger) = open_cluster(3, 2);
    // key 1 is owned by nodes 1 and 2.
    cluster.partition(NodeId(1));

    assert!(matches!(
        ledger.create_account(key(1)),
        Err(LedgerError::ReplicationFailure { node: NodeId(1), .. })
    ));
    assert_eq!(ledger.account_count(), 0);

    // key 2 is owned by nodes 2 and 0.
    ledger.create_account(key(2)).unwrap();
    cluster.heal(NodeId(1));
    ledger.create_account(key(1)).unwrap();
    assert!(cluster.replica_keys(NodeId(1)).contains(&key(1)));
}

#[test]
fn clear_requires_every_node() {
    let (cluster, ledger) = open_with_accounts(3, 2, 4);
    cluster.partition(NodeId(1));

    assert!(matches!(
        ledger.clear(),
        Err(LedgerError::ClearFailure { node: NodeId(1), .. })
    ));
    assert_eq!(ledger.account_count(), 4);

    cluster.heal(NodeId(1));
    ledger.clear().unwrap();
    assert_eq!(ledger.account_count(), 0);
    for node in 0..3 {
        assert!(cluster.replica_keys(NodeId(node)).is_empty());
    }
}

#[test]
fn transfer_waiting_on_a_lock_sees_a_clear() {
    let cluster = Arc::new(InMemoryCluster::new(ClusterConfig::new(3)));
    let config = LedgerConfig::new()
        .replication_factor(2)
        .lock_timeout(Duration::from_secs(5));
    let ledger = Arc::new(Ledger::with_cluster(config, cluster.clone()));
    ledger.open().unwrap();
    ledger.create_account(key(1)).unwrap();
    ledger.create_account(key(2)).unwrap();

    let holder = TransactionId::new(u64::MAX);
    ledger
        .lock_manager()
        .acquire(key(2), holder, Duration::ZERO)
        .unwrap();

    // Passes the unlocked existence check, takes key 1, waits on key 2.
    let transfer = {
        let ledger = Arc::clone(&ledger);
        thread::spawn(move || ledger.perform_transfer(key(1), key(2), 5))
    };
    while ledger.lock_manager().holder(key(1)).is_none() {
        thread::sleep(Duration::from_millis(1));
    }

    ledger.clear().unwrap();
    ledger.lock_manager().release(key(2), holder);

    assert_eq!(
        transfer.join().unwrap(),
        Err(LedgerError::NotFound { id: key(1) })
    );
    assert_eq!(ledger.account_count(), 0);
    for node in 0..3 {
        assert!(cluster.replica_keys(NodeId(node)).is_empty());
    }
}

#[test]
fn slow_replica_times_out() {
    let cluster = Arc::new(InMemoryCluster::new(
        ClusterConfig::new(2).with_latency(Duration::from_millis(50)),
    ));
    let config = LedgerConfig::new().replication_timeout(Duration::from_millis(10));
    let ledger = Ledger::with_cluster(config, cluster);
    ledger.open().unwrap();

    let err = ledger.create_account(key(1)).unwrap_err();
    assert!(matches!(err, LedgerError::ReplicationFailure { .. }));
    assert!(err.is_transient());
    assert_eq!(ledger.account_count(), 0);
}

#[test]
fn replicas_follow_the_router() {
    let (cluster, ledger) = open_with_accounts(5, 2, 20);
    for id in 1..=20 {
        for node in ledger.owners(key(id)) {
            if node == ledger.local_node() {
                continue;
            }
            assert!(
                cluster.replica_keys(node).contains(&key(id)),
                "{node} should hold {}",
                key(id)
            );
        }
    }
    assert!(ledger.verify_replicas().unwrap().is_empty());
}

#[test]
fn local_ledger_needs_no_cluster() {
    let ledger = Ledger::open_local().unwrap();
    ledger.create_account(key(1)).unwrap();
    ledger.create_account(key(2)).unwrap();
    ledger.perform_transfer(key(2), key(1), 9).unwrap();
    assert_eq!(ledger.get_balance(key(1)).unwrap(), 9);
    assert!(ledger.verify_replicas().unwrap().is_empty());
}
