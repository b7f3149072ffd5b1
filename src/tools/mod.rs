//! MCP tool implementations.
//!
//! This module contains all tool handlers exposed by the server:
//! - `query`: Execute arbitrary SQL statements
//! - `schema`: Introspection tools (tables, columns, keys, relationships)
//! - `insert`: Batch insert of agent analysis results
//! - `report`: Power BI report URL generation
//! - `ident`: SQL identifier validation shared by the handlers above

pub mod ident;
pub mod insert;
pub mod query;
pub mod report;
pub mod schema;

pub use insert::{InsertAgentOutputInput, InsertAgentOutputOutput, InsertToolHandler};
pub use query::{ExecuteSqlInput, ExecuteSqlOutput, QueryToolHandler};
pub use report::{GenerateReportUrlInput, ReportConfig, ReportToolHandler, ReportUrlOutput};
pub use schema::SchemaToolHandler;
