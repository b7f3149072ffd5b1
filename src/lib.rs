//! Delfos MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for an AI
//! analysis agent to explore a PostgreSQL warehouse, persist analysis
//! results, and hand back shareable Power BI report links.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::DelfosService;
