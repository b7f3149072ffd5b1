//! Generic query execution tool.
//!
//! This module implements the `execute_sql_query` MCP tool. The statement is
//! caller-supplied verbatim and executed without content validation - an
//! explicit trust boundary: deploy this server only against databases whose
//! callers are trusted with arbitrary SQL.

use crate::db::{ConnectionProvider, QueryExecutor, QueryOutcome, render};
use crate::error::DbResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Sentinel text for a statement that ran successfully but returned no rows.
pub const NO_RESULTS_TEXT: &str = "No results found.";

/// Input for the execute_sql_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    /// SQL statement to execute, passed to the database verbatim
    pub query: String,
}

/// Output from the execute_sql_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteSqlOutput {
    /// Newline-joined row text, or "No results found." when empty
    pub text: String,
    /// Result rows as key-value maps
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Number of rows returned
    pub row_count: usize,
    /// True when the statement succeeded but produced no rows
    pub empty: bool,
    /// Query execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Handler for generic query execution.
pub struct QueryToolHandler {
    provider: Arc<ConnectionProvider>,
    executor: QueryExecutor,
}

impl QueryToolHandler {
    pub fn new(provider: Arc<ConnectionProvider>, statement_timeout: Duration) -> Self {
        Self {
            provider,
            executor: QueryExecutor::new(statement_timeout),
        }
    }

    /// Handle the execute_sql_query tool call.
    ///
    /// Acquires a fresh connection, executes the statement, and releases the
    /// connection before the result is inspected, so the release step runs on
    /// success and failure alike.
    pub async fn execute_sql_query(&self, input: ExecuteSqlInput) -> DbResult<ExecuteSqlOutput> {
        let mut conn = self.provider.acquire().await?;
        let start = Instant::now();
        let result = self.executor.fetch(&mut conn, &input.query).await;
        self.provider.release(conn).await;

        let outcome = result?;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let output = match outcome {
            QueryOutcome::Empty => ExecuteSqlOutput {
                text: NO_RESULTS_TEXT.to_string(),
                rows: Vec::new(),
                row_count: 0,
                empty: true,
                execution_time_ms,
            },
            QueryOutcome::Rows(rows) => {
                let text = rows
                    .iter()
                    .map(render::render_row)
                    .collect::<Vec<_>>()
                    .join("\n");
                let json_rows: Vec<_> = rows.iter().map(render::row_to_json_map).collect();
                let row_count = json_rows.len();
                ExecuteSqlOutput {
                    text,
                    rows: json_rows,
                    row_count,
                    empty: false,
                    execution_time_ms,
                }
            }
        };

        info!(
            row_count = output.row_count,
            execution_time_ms = output.execution_time_ms,
            "Query executed"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_deserialization() {
        let json = r#"{"query": "SELECT * FROM sales"}"#;
        let input: ExecuteSqlInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.query, "SELECT * FROM sales");
    }

    #[test]
    fn test_empty_output_serialization() {
        let output = ExecuteSqlOutput {
            text: NO_RESULTS_TEXT.to_string(),
            rows: Vec::new(),
            row_count: 0,
            empty: true,
            execution_time_ms: 3,
        };

        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"empty\":true"));
        assert!(json.contains("No results found."));
        // Empty row vectors are omitted entirely
        assert!(!json.contains("\"rows\""));
    }

    #[test]
    fn test_populated_output_serialization() {
        let mut row = serde_json::Map::new();
        row.insert("total".to_string(), serde_json::json!(7));

        let output = ExecuteSqlOutput {
            text: "(7)".to_string(),
            rows: vec![row],
            row_count: 1,
            empty: false,
            execution_time_ms: 12,
        };

        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"row_count\":1"));
        assert!(json.contains("\"total\":7"));
    }
}
