//! Bank scenarios over the standard 1000-account fixture.

use ledger_core::{AccountId, LedgerError};
use ledger_testkit::prelude::*;

fn key(k: i64) -> AccountId {
    AccountId::new(k)
}

#[test]
fn get_balance_of_unknown_account() {
    let bank = scenarios::bank();
    assert_eq!(
        bank.get_balance(key(-1)),
        Err(LedgerError::NotFound { id: key(-1) })
    );
}

#[test]
fn simple_transfer() {
    for bank in [scenarios::bank(), scenarios::replicated_bank()] {
        bank.perform_transfer(key(1), key(2), 100).unwrap();

        assert_eq!(bank.get_balance(key(1)).unwrap(), -100);
        assert_eq!(bank.get_balance(key(2)).unwrap(), 100);
        bank.assert_consistent();
    }
}

#[test]
fn create_existing_account() {
    let bank = scenarios::bank();
    assert_eq!(
        bank.create_account(key(1)),
        Err(LedgerError::AlreadyExists { id: key(1) })
    );
}

#[test]
fn transfer_from_unknown_account() {
    let bank = scenarios::replicated_bank();
    assert_eq!(
        bank.perform_transfer(key(-1), key(2), 100),
        Err(LedgerError::NotFound { id: key(-1) })
    );
    assert_eq!(bank.get_balance(key(2)).unwrap(), 0);
}

#[test]
fn transfer_to_unknown_account() {
    let bank = scenarios::replicated_bank();
    assert_eq!(
        bank.perform_transfer(key(1), key(-1), 100),
        Err(LedgerError::NotFound { id: key(-1) })
    );
    assert_eq!(bank.get_balance(key(1)).unwrap(), 0);
}

#[test]
fn clear_then_rebuild() {
    let bank = scenarios::replicated_bank();
    bank.perform_transfer(key(3), key(4), 9).unwrap();

    bank.clear().unwrap();
    assert_eq!(bank.account_count(), 0);

    let bank = bank.with_accounts(BANK_ACCOUNTS);
    assert_eq!(bank.get_balance(key(3)).unwrap(), 0);
    bank.assert_consistent();
}

#[test]
fn concurrent_bank_load() {
    let bank = scenarios::replicated_bank();
    let config = StressConfig {
        operations: 4_000,
        threads: 8,
        accounts: BANK_ACCOUNTS,
        max_amount: 500,
    };

    let result = stress_concurrent_transfers(bank.shared(), &config);
    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, 4_000);
    bank.assert_consistent();
}

#[test]
fn partition_mid_run_keeps_replicas_consistent() {
    let bank = scenarios::fully_replicated(3, 50);
    let config = StressConfig {
        operations: 300,
        accounts: 50,
        ..Default::default()
    };

    let result = stress_transfers_with_partition(&bank, ledger_cluster::NodeId(2), &config);

    // Every key lives on node 2, so the middle third fails.
    assert_eq!(result.failed_ops, 100);
    assert_eq!(result.successful_ops, 200);
    assert_eq!(bank.stats().replication_failures, 100);
    bank.assert_consistent();
}
