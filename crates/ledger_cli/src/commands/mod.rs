//! CLI command implementations.

pub mod route;
pub mod simulate;
