//! Simulate command implementation.

use ledger_cluster::{ClusterConfig, InMemoryCluster, NodeId};
use ledger_core::{AccountId, Ledger, LedgerConfig, LedgerError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Workload parameters.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of cluster nodes.
    pub nodes: u32,
    /// Owners per key.
    pub replicas: usize,
    /// Number of accounts.
    pub accounts: i64,
    /// Number of transfers.
    pub transfers: usize,
    /// Worker threads.
    pub threads: usize,
    /// Largest amount moved by one transfer.
    pub max_amount: i64,
    /// Workload seed.
    pub seed: u64,
    /// Node to partition for the run.
    pub partition: Option<u32>,
    /// Lock timeout in milliseconds.
    pub lock_timeout_ms: u64,
}

/// Outcome counts for one worker.
#[derive(Debug, Default, Clone, Copy)]
struct Outcomes {
    committed: usize,
    lock_timeouts: usize,
    replication_failures: usize,
    other_failures: usize,
    worker_panics: usize,
}

impl Outcomes {
    /// Outcomes of a finished worker; a panicked worker counts as a failure.
    fn joined(result: thread::Result<Self>) -> Self {
        result.unwrap_or_else(|_| {
            warn!("simulation worker panicked");
            Self {
                worker_panics: 1,
                ..Self::default()
            }
        })
    }

    fn record(&mut self, result: Result<(), LedgerError>) {
        match result {
            Ok(()) => self.committed += 1,
            Err(LedgerError::LockTimeout { .. }) => self.lock_timeouts += 1,
            Err(LedgerError::ReplicationFailure { .. }) => self.replication_failures += 1,
            Err(_) => self.other_failures += 1,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.committed += other.committed;
        self.lock_timeouts += other.lock_timeouts;
        self.replication_failures += other.replication_failures;
        self.other_failures += other.other_failures;
        self.worker_panics += other.worker_panics;
        self
    }
}

/// Simulation result.
#[derive(Debug, Serialize)]
pub struct SimulateReport {
    /// Number of cluster nodes.
    pub nodes: u32,
    /// Owners per key.
    pub replication_factor: usize,
    /// Number of accounts.
    pub accounts: usize,
    /// Transfers attempted.
    pub transfers: usize,
    /// Transfers committed.
    pub committed: usize,
    /// Transfers rolled back on lock timeout.
    pub lock_timeouts: usize,
    /// Transfers rolled back on replication failure.
    pub replication_failures: usize,
    /// Transfers rolled back for any other reason.
    pub other_failures: usize,
    /// Workers that panicked; their transfers are not counted above.
    pub worker_panics: usize,
    /// Partitioned node, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitioned: Option<u32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
    /// Transfers per second.
    pub throughput: f64,
    /// Sum of all balances after the run.
    pub total_balance: i128,
    /// Replicas that disagree with the committed view.
    pub replica_mismatches: usize,
}

impl SimulateReport {
    /// Checks that every worker finished.
    pub fn is_complete(&self) -> bool {
        self.worker_panics == 0
    }

    /// Checks that no money was created or lost and replicas agree.
    pub fn is_consistent(&self) -> bool {
        self.total_balance == 0 && self.replica_mismatches == 0
    }
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = simulate(options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    if !report.is_complete() {
        return Err(format!("{} simulation workers panicked", report.worker_panics).into());
    }
    if report.is_consistent() {
        Ok(())
    } else {
        Err("ledger is inconsistent after the run".into())
    }
}

/// Builds a cluster, runs the workload and checks the result.
pub fn simulate(options: &SimulateOptions) -> Result<SimulateReport, Box<dyn std::error::Error>> {
    if options.accounts < 2 {
        return Err("at least two accounts are needed for transfers".into());
    }
    if options.max_amount < 1 {
        return Err("max amount must be positive".into());
    }
    if let Some(node) = options.partition {
        if node == 0 || node >= options.nodes {
            return Err(format!("cannot partition node {node}: pick 1..{}", options.nodes).into());
        }
    }

    let cluster = Arc::new(InMemoryCluster::new(ClusterConfig::new(options.nodes)));
    let config = LedgerConfig::new()
        .replication_factor(options.replicas)
        .lock_timeout(Duration::from_millis(options.lock_timeout_ms));
    let ledger = Arc::new(Ledger::with_cluster(config, Arc::clone(&cluster)));
    ledger.open()?;

    for id in 0..options.accounts {
        ledger.create_account(AccountId::new(id))?;
    }
    info!(accounts = options.accounts, "accounts created");

    if let Some(node) = options.partition {
        warn!(node, "partitioning node for the run");
        cluster.partition(NodeId(node));
    }

    let start = Instant::now();
    let outcomes = run_workers(&ledger, options);
    let duration = start.elapsed();

    if let Some(node) = options.partition {
        cluster.heal(NodeId(node));
    }

    let mismatches = ledger.verify_replicas()?;
    let report = SimulateReport {
        nodes: options.nodes,
        replication_factor: options.replicas,
        accounts: ledger.account_count(),
        transfers: options.transfers,
        committed: outcomes.committed,
        lock_timeouts: outcomes.lock_timeouts,
        replication_failures: outcomes.replication_failures,
        other_failures: outcomes.other_failures,
        worker_panics: outcomes.worker_panics,
        partitioned: options.partition,
        duration_ms: duration.as_millis(),
        throughput: if duration.as_secs_f64() > 0.0 {
            options.transfers as f64 / duration.as_secs_f64()
        } else {
            0.0
        },
        total_balance: ledger.total_balance(),
        replica_mismatches: mismatches.len(),
    };

    ledger.close()?;
    Ok(report)
}

fn run_workers(ledger: &Arc<Ledger>, options: &SimulateOptions) -> Outcomes {
    let threads = options.threads.max(1);
    let per_thread = options.transfers / threads;
    let remainder = options.transfers % threads;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let ledger = Arc::clone(ledger);
            let count = per_thread + usize::from(t < remainder);
            let accounts = options.accounts;
            let max_amount = options.max_amount;
            let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(t as u64));

            thread::spawn(move || {
                let mut outcomes = Outcomes::default();
                for _ in 0..count {
                    let from = rng.gen_range(0..accounts);
                    let to = (from + rng.gen_range(1..accounts)) % accounts;
                    let amount = rng.gen_range(1..=max_amount);
                    outcomes.record(ledger.perform_transfer(
                        AccountId::new(from),
                        AccountId::new(to),
                        amount,
                    ));
                }
                outcomes
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| Outcomes::joined(handle.join()))
        .fold(Outcomes::default(), Outcomes::merge)
}

fn print_text_output(report: &SimulateReport) {
    println!("Ledger Simulation");
    println!("=================");
    println!();
    println!("Cluster:");
    println!("  Nodes:              {}", report.nodes);
    println!("  Replication factor: {}", report.replication_factor);
    if let Some(node) = report.partitioned {
        println!("  Partitioned:        node:{}", node);
    }
    println!("  Accounts:           {}", report.accounts);
    println!();
    println!("Transfers:");
    println!("  Attempted:            {}", report.transfers);
    println!("  Committed:            {}", report.committed);
    println!("  Lock timeouts:        {}", report.lock_timeouts);
    println!("  Replication failures: {}", report.replication_failures);
    println!("  Other failures:       {}", report.other_failures);
    if report.worker_panics > 0 {
        println!("  Panicked workers:     {}", report.worker_panics);
    }
    println!("  Duration:             {} ms", report.duration_ms);
    println!("  Throughput:           {:.2} transfers/sec", report.throughput);
    println!();
    println!("Consistency:");
    println!("  Total balance:      {}", report.total_balance);
    println!("  Replica mismatches: {}", report.replica_mismatches);
    println!(
        "  Status:             {}",
        if report.is_consistent() { "OK" } else { "INCONSISTENT" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> SimulateOptions {
        SimulateOptions {
            nodes: 3,
            replicas: 2,
            accounts: 20,
            transfers: 500,
            threads: 3,
            max_amount: 100,
            seed: 7,
            partition: None,
            lock_timeout_ms: 15_000,
        }
    }

    #[test]
    fn healthy_cluster_commits_everything() {
        let report = simulate(&options()).unwrap();
        assert_eq!(report.committed, 500);
        assert!(report.is_consistent());
    }

    #[test]
    fn partitioned_cluster_stays_consistent() {
        let report = simulate(&SimulateOptions {
            partition: Some(2),
            ..options()
        })
        .unwrap();
        assert!(report.replication_failures > 0);
        assert_eq!(
            report.committed + report.replication_failures,
            report.transfers
        );
        assert!(report.is_consistent());
    }

    #[test]
    fn panicked_worker_is_reported() {
        let panicked = Outcomes::joined(Err(Box::new("worker failed")));
        assert_eq!(panicked.worker_panics, 1);
        assert_eq!(panicked.committed, 0);

        let finished = Outcomes {
            committed: 4,
            ..Outcomes::default()
        };
        let total = Outcomes::joined(Ok(finished)).merge(panicked);
        assert_eq!(total.committed, 4);
        assert_eq!(total.worker_panics, 1);
    }

    #[test]
    fn healthy_run_is_complete() {
        let report = simulate(&SimulateOptions {
            transfers: 50,
            ..options()
        })
        .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.worker_panics, 0);
    }

    #[test]
    fn rejects_bad_options() {
        assert!(simulate(&SimulateOptions { accounts: 1, ..options() }).is_err());
        assert!(simulate(&SimulateOptions { partition: Some(0), ..options() }).is_err());
        assert!(simulate(&SimulateOptions { partition: Some(3), ..options() }).is_err());
    }
}
