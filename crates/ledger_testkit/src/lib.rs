//! # Ledger Testkit
//!
//! Test utilities for the replicated ledger.
//!
//! This crate provides:
//! - Test fixtures with pre-created accounts and fault-injectable clusters
//! - Property-based test generators using proptest
//! - A model-checking harness for integration tests
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```
//! use ledger_testkit::prelude::*;
//!
//! let bank = scenarios::bank();
//! let result = stress_sequential_transfers(&bank, &StressConfig {
//!     operations: 100,
//!     ..Default::default()
//! });
//! assert_eq!(result.failed_ops, 0);
//! bank.assert_consistent();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
