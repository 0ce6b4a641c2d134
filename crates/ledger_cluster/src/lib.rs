//! # Ledger Cluster
//!
//! Cluster membership and replica transport for the replicated ledger.
//!
//! The ledger core depends only on the [`Membership`] and
//! [`ReplicaTransport`] traits. This crate also ships [`InMemoryCluster`],
//! an in-process implementation of both with fault injection, which the
//! tests and the `ledger` binary run against.
//!
//! ## Replication protocol
//!
//! The coordinator ships writes with [`ReplicationMessage`]:
//! 1. `Prepare` stages writes on every replica (not yet visible)
//! 2. `Commit` applies the staged writes, or `Abort` discards them
//! 3. `Restore` puts earlier values back if a commit only partly landed

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod memory;
mod transport;
mod types;

pub use config::ClusterConfig;
pub use error::{ClusterError, ClusterResult};
pub use memory::InMemoryCluster;
pub use transport::{Membership, ReplicaTransport};
pub use types::{NodeId, ReplicaWrite, ReplicationMessage};
