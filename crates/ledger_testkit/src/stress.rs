//! Stress tests for the ledger.
//!
//! These drivers run transfer workloads under heavy and concurrent load.
//! Transfers are picked deterministically so runs are repeatable.

use crate::fixtures::TestLedger;
use ledger_cluster::NodeId;
use ledger_core::{AccountId, Ledger, LedgerError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of transfers to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of distinct accounts.
    pub accounts: i64,
    /// Largest amount moved by one transfer.
    pub max_amount: i64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            accounts: 100,
            max_amount: 1_000,
        }
    }
}

/// Picks the `n`th transfer of a workload over `accounts` accounts.
///
/// `from` and `to` always differ when there are at least two accounts.
pub fn nth_transfer(n: usize, accounts: i64, max_amount: i64) -> (AccountId, AccountId, i64) {
    let accounts = accounts.max(1);
    let n = n as i64;
    let from = n.rem_euclid(accounts);
    let step = if accounts > 1 {
        1 + (n / accounts).rem_euclid(accounts - 1)
    } else {
        0
    };
    let to = (from + step).rem_euclid(accounts);
    let amount = 1 + n.rem_euclid(max_amount.max(1));
    (AccountId::new(from), AccountId::new(to), amount)
}

/// Creates accounts `0..count`, skipping those that exist.
pub fn ensure_accounts(ledger: &Ledger, count: i64) -> Result<(), LedgerError> {
    for id in 0..count {
        match ledger.create_account(AccountId::new(id)) {
            Ok(()) | Err(LedgerError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Run a sequential transfer stress test.
pub fn stress_sequential_transfers(ledger: &Ledger, config: &StressConfig) -> StressTestResult {
    ensure_accounts(ledger, config.accounts).expect("Failed to create accounts");

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let (from, to, amount) = nth_transfer(i, config.accounts, config.max_amount);
        match ledger.perform_transfer(from, to, amount) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a concurrent transfer stress test.
pub fn stress_concurrent_transfers(ledger: Arc<Ledger>, config: &StressConfig) -> StressTestResult {
    ensure_accounts(&ledger, config.accounts).expect("Failed to create accounts");

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let threads = config.threads.max(1);
    let ops_per_thread = config.operations / threads;

    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let n = t * ops_per_thread + i;
                    let (from, to, amount) = nth_transfer(n, config.accounts, config.max_amount);
                    match ledger.perform_transfer(from, to, amount) {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run opposing transfers on one account pair from many threads.
///
/// Even threads move money from account 0 to account 1, odd threads move
/// it back. Every transfer contends on the same two locks in opposite
/// semantic order, which deadlocks under request-order locking.
pub fn stress_opposing_transfers(ledger: Arc<Ledger>, config: &StressConfig) -> StressTestResult {
    ensure_accounts(&ledger, 2).expect("Failed to create accounts");

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let threads = config.threads.max(2);
    let ops_per_thread = config.operations / threads;
    let (a, b) = (AccountId::new(0), AccountId::new(1));

    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let (from, to) = if t % 2 == 0 { (a, b) } else { (b, a) };

            thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    match ledger.perform_transfer(from, to, 1) {
                        Ok(()) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run transfers while one replica is partitioned for the middle third.
///
/// Transfers touching the partitioned node fail and roll back; the rest
/// commit. The node is healed before returning.
pub fn stress_transfers_with_partition(
    test_ledger: &TestLedger,
    node: NodeId,
    config: &StressConfig,
) -> StressTestResult {
    ensure_accounts(&test_ledger.ledger, config.accounts).expect("Failed to create accounts");

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;
    let third = config.operations / 3;

    for i in 0..config.operations {
        if i == third {
            test_ledger.cluster.partition(node);
        } else if i == 2 * third {
            test_ledger.cluster.heal(node);
        }

        let (from, to, amount) = nth_transfer(i, config.accounts, config.max_amount);
        match test_ledger.ledger.perform_transfer(from, to, amount) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    test_ledger.cluster.heal(node);

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run transfers interleaved with balance reads.
pub fn stress_mixed_operations(ledger: &Ledger, config: &StressConfig) -> StressTestResult {
    ensure_accounts(ledger, config.accounts).expect("Failed to create accounts");

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let (from, to, amount) = nth_transfer(i, config.accounts, config.max_amount);

        let result = if i % 2 == 0 {
            ledger.perform_transfer(from, to, amount)
        } else {
            ledger.get_balance(from).map(|_| ())
        };

        match result {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nth_transfer_never_self_transfers() {
        for n in 0..500 {
            let (from, to, amount) = nth_transfer(n, 7, 10);
            assert_ne!(from, to);
            assert!((1..=10).contains(&amount));
            assert!((0..7).contains(&to.as_i64()));
        }
    }

    #[test]
    fn test_sequential_transfers() {
        let test_ledger = TestLedger::local();
        let config = StressConfig {
            operations: 1_000,
            accounts: 20,
            ..Default::default()
        };

        let result = stress_sequential_transfers(&test_ledger, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 1_000);
        test_ledger.assert_consistent();
    }

    #[test]
    fn test_concurrent_transfers() {
        let test_ledger = TestLedger::replicated(3, 2);
        let config = StressConfig {
            operations: 1_000,
            threads: 4,
            accounts: 10,
            max_amount: 50,
        };

        let result = stress_concurrent_transfers(test_ledger.shared(), &config);
        assert_eq!(result.failed_ops, 0);
        test_ledger.assert_consistent();
    }

    #[test]
    fn test_opposing_transfers() {
        let test_ledger = TestLedger::replicated(2, 2);
        let config = StressConfig {
            operations: 1_000,
            threads: 4,
            ..Default::default()
        };

        let result = stress_opposing_transfers(test_ledger.shared(), &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(test_ledger.balances(2), vec![0, 0]);
    }

    #[test]
    fn test_mixed_operations() {
        let test_ledger = TestLedger::local();
        let config = StressConfig {
            operations: 1_000,
            accounts: 10,
            ..Default::default()
        };

        let result = stress_mixed_operations(&test_ledger, &config);
        assert_eq!(result.failed_ops, 0);
    }
}
