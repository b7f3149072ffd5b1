//! Batch insert of agent analysis results.
//!
//! This module implements the `insert_agent_output_batch` MCP tool. One run
//! identifier and one timestamp are generated per call and shared by every
//! row of the batch. All rows are written inside a single database
//! transaction: if any row fails, the whole batch rolls back, so a partially
//! written run_id is never visible to downstream report consumers.

use crate::db::ConnectionProvider;
use crate::error::{DbError, DbResult};
use crate::tools::ident::quoted_identifier;
use crate::tools::report::VisualHint;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// One analysis result row supplied by the caller.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AgentResultRow {
    /// X-axis value
    #[serde(default)]
    pub x_value: Option<String>,
    /// Y-axis numeric value
    #[serde(default)]
    pub y_value: Option<f64>,
    /// Series name for grouping
    #[serde(default)]
    pub series: Option<String>,
    /// Category name
    #[serde(default)]
    pub category: Option<String>,
}

/// Input for the insert_agent_output_batch tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertAgentOutputInput {
    /// User identifier/email
    pub user_id: String,
    /// The natural language question asked by the user
    pub question: String,
    /// Name of the metric being measured
    pub metric_name: String,
    /// Visualization kind: line, bar, grouped_bar, pie, or table
    pub visual_hint: String,
    /// Result rows to insert under one generated run_id
    pub results: Vec<AgentResultRow>,
}

/// Output from the insert_agent_output_batch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct InsertAgentOutputOutput {
    /// Generated run identifier shared by all rows of the batch
    pub run_id: String,
    /// Number of rows committed (equals the input length on success)
    pub rows_inserted: usize,
    /// Batch timestamp shared by all rows, RFC 3339
    pub created_at: String,
    /// "Inserted N rows successfully. run_id: <uuid>"
    pub text: String,
}

/// Resolve the caller-supplied hint to its canonical stored form.
fn canonical_hint(visual_hint: &str) -> DbResult<&'static str> {
    VisualHint::parse(visual_hint)
        .map(|h| h.canonical_name())
        .ok_or_else(|| {
            DbError::validation(format!(
                "Unknown visual_hint '{visual_hint}'. Expected one of: line, bar, grouped_bar, pie, table"
            ))
        })
}

/// Confirmation text for a committed batch.
fn confirmation_message(rows_inserted: usize, run_id: Uuid) -> String {
    format!("Inserted {rows_inserted} rows successfully. run_id: {run_id}")
}

/// Handler for the batch insert coordinator.
pub struct InsertToolHandler {
    provider: Arc<ConnectionProvider>,
    statement_timeout: Duration,
    /// Schema namespace holding the agent_output table (validated at startup)
    table_schema: String,
}

impl InsertToolHandler {
    pub fn new(
        provider: Arc<ConnectionProvider>,
        statement_timeout: Duration,
        table_schema: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            statement_timeout,
            table_schema: table_schema.into(),
        }
    }

    /// Handle the insert_agent_output_batch tool call.
    pub async fn insert_agent_output_batch(
        &self,
        input: InsertAgentOutputInput,
    ) -> DbResult<InsertAgentOutputOutput> {
        let visual_hint = canonical_hint(&input.visual_hint)?;
        let schema = quoted_identifier("schema", &self.table_schema)?;
        let sql = format!(
            "INSERT INTO {schema}.\"agent_output\" \
             (run_id, user_id, question, x_value, y_value, \
              series, category, metric_name, visual_hint, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );

        let run_id = Uuid::new_v4();
        let created_at = Utc::now();

        let mut conn = self.provider.acquire().await?;
        let result = tokio::time::timeout(
            self.statement_timeout,
            self.insert_batch(&mut conn, &input, visual_hint, run_id, created_at, &sql),
        )
        .await;
        self.provider.release(conn).await;

        let rows_inserted = match result {
            Ok(inner) => inner?,
            Err(_) => {
                return Err(DbError::timeout(
                    "batch insert",
                    self.statement_timeout.as_secs() as u32,
                ));
            }
        };

        info!(
            run_id = %run_id,
            rows_inserted = rows_inserted,
            visual_hint = visual_hint,
            "Agent output batch committed"
        );

        Ok(InsertAgentOutputOutput {
            run_id: run_id.to_string(),
            rows_inserted,
            created_at: created_at.to_rfc3339(),
            text: confirmation_message(rows_inserted, run_id),
        })
    }

    /// Insert every row inside one transaction; rollback on any failure.
    async fn insert_batch(
        &self,
        conn: &mut PgConnection,
        input: &InsertAgentOutputInput,
        visual_hint: &str,
        run_id: Uuid,
        created_at: DateTime<Utc>,
        sql: &str,
    ) -> DbResult<usize> {
        let total = input.results.len();
        let mut tx = conn.begin().await.map_err(DbError::from)?;

        for (idx, row) in input.results.iter().enumerate() {
            let result = sqlx::query(sql)
                .bind(run_id)
                .bind(&input.user_id)
                .bind(&input.question)
                .bind(row.x_value.as_deref())
                .bind(row.y_value)
                .bind(row.series.as_deref())
                .bind(row.category.as_deref())
                .bind(&input.metric_name)
                .bind(visual_hint)
                .bind(created_at)
                .execute(&mut *tx)
                .await;

            if let Err(e) = result {
                // Best-effort rollback; the connection is closed right after
                let _ = tx.rollback().await;
                return Err(row_write_error(idx, total, e));
            }
        }

        tx.commit().await.map_err(DbError::from)?;
        Ok(total)
    }
}

/// Map a failed row insert to a write error naming the failing position.
fn row_write_error(idx: usize, total: usize, err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            DbError::write(
                format!(
                    "Row {} of {} failed, batch rolled back: {}",
                    idx + 1,
                    total,
                    db_err.message()
                ),
                code,
            )
        }
        other => DbError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_deserialization_with_optional_keys() {
        let json = r#"{
            "user_id": "ana@example.com",
            "question": "Sales by country?",
            "metric_name": "total_sales",
            "visual_hint": "bar",
            "results": [
                {"x_value": "United States", "y_value": 123456.78, "category": "United States"},
                {"x_value": "Canada"}
            ]
        }"#;

        let input: InsertAgentOutputInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.results.len(), 2);
        assert_eq!(input.results[0].y_value, Some(123456.78));
        assert!(input.results[0].series.is_none());
        assert!(input.results[1].y_value.is_none());
        assert!(input.results[1].category.is_none());
    }

    #[test]
    fn test_canonical_hint_accepts_documented_values() {
        assert_eq!(canonical_hint("pie").unwrap(), "pie");
        assert_eq!(canonical_hint("bar").unwrap(), "bar");
        assert_eq!(canonical_hint("line").unwrap(), "line");
        assert_eq!(canonical_hint("table").unwrap(), "table");
    }

    #[test]
    fn test_canonical_hint_normalizes_spanish_spellings() {
        assert_eq!(canonical_hint("linea").unwrap(), "line");
        assert_eq!(canonical_hint("barras").unwrap(), "bar");
        assert_eq!(canonical_hint("barras_agrupadas").unwrap(), "grouped_bar");
    }

    #[test]
    fn test_canonical_hint_rejects_unknown() {
        let err = canonical_hint("scatter").unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
        assert!(err.to_string().contains("scatter"));
    }

    #[test]
    fn test_confirmation_message_format() {
        let run_id = Uuid::nil();
        assert_eq!(
            confirmation_message(3, run_id),
            "Inserted 3 rows successfully. run_id: 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_row_write_error_names_failing_position() {
        let err = row_write_error(2, 5, sqlx::Error::RowNotFound);
        // Non-database errors keep their original mapping
        assert!(matches!(err, DbError::Execution { .. }));
    }

    #[test]
    fn test_output_serialization() {
        let output = InsertAgentOutputOutput {
            run_id: "00000000-0000-0000-0000-000000000000".to_string(),
            rows_inserted: 2,
            created_at: "2024-05-01T12:00:00+00:00".to_string(),
            text: "Inserted 2 rows successfully. run_id: 00000000-0000-0000-0000-000000000000"
                .to_string(),
        };
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"rows_inserted\":2"));
        assert!(json.contains("run_id"));
    }
}
