//! Route command implementation.

use ledger_cluster::{ClusterConfig, InMemoryCluster};
use ledger_core::{AccountId, KeyRouter, NodeId};
use std::sync::Arc;

/// Runs the route command.
pub fn run(nodes: u32, replicas: usize, keys: &[i64]) -> Result<(), Box<dyn std::error::Error>> {
    if nodes == 0 {
        return Err("a cluster needs at least one node".into());
    }

    let router = KeyRouter::new(
        Arc::new(InMemoryCluster::new(ClusterConfig::new(nodes))),
        replicas,
    );

    println!("Placement on {nodes} nodes, {replicas} owners per key:");
    for key in keys {
        let id = AccountId::new(*key);
        println!("  {:<12} -> {}", id.to_string(), format_owners(&router.owners(id)));
    }

    Ok(())
}

fn format_owners(owners: &[NodeId]) -> String {
    owners
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
