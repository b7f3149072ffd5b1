//! Database access layer.
//!
//! This module provides per-invocation database access:
//! - Connection provider (one connection per tool call, no pooling)
//! - Statement execution with per-call timeouts
//! - Dynamic result-row rendering

pub mod executor;
pub mod provider;
pub mod render;

pub use executor::{QueryExecutor, QueryOutcome};
pub use provider::ConnectionProvider;
