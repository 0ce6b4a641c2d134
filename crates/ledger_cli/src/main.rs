//! Ledger CLI
//!
//! Command-line tools for exercising the replicated ledger.
//!
//! # Commands
//!
//! - `simulate` - Run a concurrent transfer workload on an in-process cluster
//! - `route` - Show which nodes own the given account keys
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Replicated ledger command-line tools.
#[derive(Parser)]
#[command(name = "ledger")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transfer workload and check conservation and replica agreement
    Simulate {
        /// Number of cluster nodes
        #[arg(short, long, default_value = "3")]
        nodes: u32,

        /// Owners per key
        #[arg(short, long, default_value = "2")]
        replicas: usize,

        /// Number of accounts
        #[arg(short, long, default_value = "1000")]
        accounts: i64,

        /// Number of transfers
        #[arg(short, long, default_value = "10000")]
        transfers: usize,

        /// Worker threads
        #[arg(long, default_value = "4")]
        threads: usize,

        /// Largest amount moved by one transfer
        #[arg(long, default_value = "1000")]
        max_amount: i64,

        /// Seed for the workload generator
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Partition this node for the whole run
        #[arg(long)]
        partition: Option<u32>,

        /// Lock timeout in milliseconds
        #[arg(long, default_value = "15000")]
        lock_timeout_ms: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the owners of account keys
    Route {
        /// Number of cluster nodes
        #[arg(short, long, default_value = "3")]
        nodes: u32,

        /// Owners per key
        #[arg(short, long, default_value = "2")]
        replicas: usize,

        /// Account keys
        #[arg(required = true, allow_negative_numbers = true)]
        keys: Vec<i64>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate {
            nodes,
            replicas,
            accounts,
            transfers,
            threads,
            max_amount,
            seed,
            partition,
            lock_timeout_ms,
            format,
        } => {
            let options = commands::simulate::SimulateOptions {
                nodes,
                replicas,
                accounts,
                transfers,
                threads,
                max_amount,
                seed,
                partition,
                lock_timeout_ms,
            };
            commands::simulate::run(&options, &format)?;
        }
        Commands::Route {
            nodes,
            replicas,
            keys,
        } => {
            commands::route::run(nodes, replicas, &keys)?;
        }
        Commands::Version => {
            println!("Ledger CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Ledger Core v{}", ledger_core::VERSION);
            println!("Account schema v{}", ledger_core::SCHEMA_VERSION);
        }
    }

    Ok(())
}
