//! Schema and metadata introspection tools.
//!
//! This module implements the catalog-backed MCP tools: `get_table_schema`,
//! `list_tables`, `get_database_info`, `get_table_row_count`,
//! `get_primary_keys`, `get_distinct_values`, and `get_table_relationships`.
//!
//! Table and column names are bound as parameters wherever the driver allows
//! it. The row-count and distinct-value queries must interpolate identifiers
//! into the statement text, so those names pass the allow-list in
//! [`crate::tools::ident`] first and are double-quoted afterwards. Both tools
//! are scoped to the configured schema namespace.
//!
//! Empty catalogs are values, not errors: each tool returns its documented
//! "none found" text alongside a structured `found`/count field.

use crate::db::{ConnectionProvider, QueryExecutor, QueryOutcome, render};
use crate::error::{DbError, DbResult};
use crate::tools::ident::{quoted_identifier, validate_identifier};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Row};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Input for tools that take a single table name.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableNameInput {
    /// Name of the table, [A-Za-z0-9_] only
    pub table_name: String,
}

/// Input for the get_distinct_values tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DistinctValuesInput {
    /// Name of the table, [A-Za-z0-9_] only
    pub table_name: String,
    /// Name of the column, [A-Za-z0-9_] only
    pub column_name: String,
}

/// One column of a table schema.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnTypeOutput {
    pub name: String,
    pub data_type: String,
}

/// Output from the get_table_schema tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchemaOutput {
    pub table_name: String,
    /// Columns in ordinal order; empty when the table is unknown
    pub columns: Vec<ColumnTypeOutput>,
    /// False when the table has no catalog entry
    pub found: bool,
    /// Newline-joined "name: type" lines, or the documented not-found text
    pub text: String,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub tables: Vec<String>,
    pub count: usize,
    pub text: String,
}

/// Output from the get_database_info tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DatabaseInfoOutput {
    pub database_name: String,
    pub version: String,
    /// "Database Name: X\nVersion: Y"
    pub text: String,
}

/// Output from the get_table_row_count tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RowCountOutput {
    pub table_name: String,
    /// None when the table has no catalog entry
    pub row_count: Option<i64>,
    pub found: bool,
    pub text: String,
}

/// Output from the get_primary_keys tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PrimaryKeysOutput {
    pub table_name: String,
    pub primary_keys: Vec<String>,
    pub found: bool,
    /// Comma-joined column names, or the documented not-found text
    pub text: String,
}

/// Output from the get_distinct_values tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DistinctValuesOutput {
    pub table_name: String,
    pub column_name: String,
    pub values: Vec<String>,
    pub count: usize,
    pub text: String,
}

/// One foreign key relationship.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RelationshipOutput {
    pub foreign_key: String,
    pub parent_table: String,
    pub parent_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Output from the get_table_relationships tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RelationshipsOutput {
    pub relationships: Vec<RelationshipOutput>,
    pub count: usize,
    pub text: String,
}

/// Handler for the schema/metadata introspection tools.
pub struct SchemaToolHandler {
    provider: Arc<ConnectionProvider>,
    executor: QueryExecutor,
    /// Schema namespace for row-count/distinct-value queries (validated at startup)
    table_schema: String,
}

impl SchemaToolHandler {
    pub fn new(
        provider: Arc<ConnectionProvider>,
        statement_timeout: Duration,
        table_schema: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            executor: QueryExecutor::new(statement_timeout),
            table_schema: table_schema.into(),
        }
    }

    /// Run `op` against a fresh connection, releasing it on every exit path.
    async fn with_connection<T, F>(&self, op: F) -> DbResult<T>
    where
        F: AsyncFnOnce(&mut PgConnection) -> DbResult<T>,
    {
        let mut conn = self.provider.acquire().await?;
        let result = op(&mut conn).await;
        self.provider.release(conn).await;
        result
    }

    /// Check whether a table exists in the configured schema namespace.
    async fn table_exists(&self, conn: &mut PgConnection, table_name: &str) -> DbResult<bool> {
        let outcome = self
            .executor
            .fetch_bound(
                conn,
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2",
                &[&self.table_schema, table_name],
            )
            .await?;
        Ok(!outcome.is_empty())
    }

    /// Handle the get_table_schema tool call.
    pub async fn get_table_schema(&self, input: TableNameInput) -> DbResult<TableSchemaOutput> {
        validate_identifier("table_name", &input.table_name)?;

        let outcome = self
            .with_connection(async |conn| {
                self.executor
                    .fetch_bound(
                        conn,
                        "SELECT column_name, data_type FROM information_schema.columns \
                         WHERE table_name = $1 ORDER BY ordinal_position",
                        &[&input.table_name],
                    )
                    .await
            })
            .await?;

        let output = match outcome {
            QueryOutcome::Empty => TableSchemaOutput {
                text: format!("No schema found for table '{}'.", input.table_name),
                table_name: input.table_name,
                columns: Vec::new(),
                found: false,
            },
            QueryOutcome::Rows(rows) => {
                let columns = collect_columns(&rows)?;
                let text = columns
                    .iter()
                    .map(|c| format!("{}: {}", c.name, c.data_type))
                    .collect::<Vec<_>>()
                    .join("\n");
                TableSchemaOutput {
                    table_name: input.table_name,
                    columns,
                    found: true,
                    text,
                }
            }
        };

        info!(
            table_name = %output.table_name,
            columns = output.columns.len(),
            "Table schema inspected"
        );
        Ok(output)
    }

    /// Handle the list_tables tool call.
    pub async fn list_tables(&self) -> DbResult<ListTablesOutput> {
        let outcome = self
            .with_connection(async |conn| {
                self.executor
                    .fetch(
                        conn,
                        "SELECT table_name FROM information_schema.tables \
                         WHERE table_type = 'BASE TABLE' \
                         AND table_schema NOT IN ('pg_catalog', 'information_schema') \
                         ORDER BY table_name",
                    )
                    .await
            })
            .await?;

        let output = match outcome {
            QueryOutcome::Empty => ListTablesOutput {
                tables: Vec::new(),
                count: 0,
                text: "No tables found in the database.".to_string(),
            },
            QueryOutcome::Rows(rows) => {
                let tables = collect_strings(&rows, "table_name")?;
                let text = tables.join("\n");
                ListTablesOutput {
                    count: tables.len(),
                    tables,
                    text,
                }
            }
        };

        info!(count = output.count, "Tables listed");
        Ok(output)
    }

    /// Handle the get_database_info tool call.
    pub async fn get_database_info(&self) -> DbResult<DatabaseInfoOutput> {
        let outcome = self
            .with_connection(async |conn| {
                self.executor
                    .fetch(
                        conn,
                        "SELECT current_database() AS database_name, version() AS version",
                    )
                    .await
            })
            .await?;

        let rows = match outcome {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Empty => {
                return Err(DbError::internal(
                    "Database returned no rows for the info query",
                ));
            }
        };

        let database_name: String = rows[0].try_get("database_name").map_err(DbError::from)?;
        let version: String = rows[0].try_get("version").map_err(DbError::from)?;
        let text = format!("Database Name: {}\nVersion: {}", database_name, version);

        info!(database_name = %database_name, "Database info inspected");
        Ok(DatabaseInfoOutput {
            database_name,
            version,
            text,
        })
    }

    /// Handle the get_table_row_count tool call.
    ///
    /// The table name cannot be bound as a parameter inside `FROM`, so it is
    /// validated and double-quoted before interpolation, and the table's
    /// existence is checked first so unknown tables report a descriptive
    /// message instead of an execution error.
    pub async fn get_table_row_count(&self, input: TableNameInput) -> DbResult<RowCountOutput> {
        let table = quoted_identifier("table_name", &input.table_name)?;
        let schema = quoted_identifier("schema", &self.table_schema)?;
        let sql = format!("SELECT COUNT(*) AS total_rows FROM {schema}.{table}");

        let counted = self
            .with_connection(async |conn| {
                if !self.table_exists(conn, &input.table_name).await? {
                    return Ok(None);
                }
                let outcome = self.executor.fetch(conn, &sql).await?;
                match outcome {
                    QueryOutcome::Rows(rows) => {
                        let count: i64 = rows[0].try_get("total_rows").map_err(DbError::from)?;
                        Ok(Some(count))
                    }
                    QueryOutcome::Empty => {
                        Err(DbError::internal("COUNT(*) query returned no rows"))
                    }
                }
            })
            .await?;

        let output = match counted {
            Some(count) => RowCountOutput {
                text: format!("Table '{}' has {} rows.", input.table_name, count),
                table_name: input.table_name,
                row_count: Some(count),
                found: true,
            },
            None => RowCountOutput {
                text: format!("Table '{}' does not exist in the database.", input.table_name),
                table_name: input.table_name,
                row_count: None,
                found: false,
            },
        };

        info!(
            table_name = %output.table_name,
            row_count = ?output.row_count,
            "Table rows counted"
        );
        Ok(output)
    }

    /// Handle the get_primary_keys tool call.
    pub async fn get_primary_keys(&self, input: TableNameInput) -> DbResult<PrimaryKeysOutput> {
        validate_identifier("table_name", &input.table_name)?;

        let outcome = self
            .with_connection(async |conn| {
                self.executor
                    .fetch_bound(
                        conn,
                        "SELECT kcu.column_name \
                         FROM information_schema.table_constraints tc \
                         JOIN information_schema.key_column_usage kcu \
                           ON tc.constraint_name = kcu.constraint_name \
                          AND tc.table_schema = kcu.table_schema \
                         WHERE tc.constraint_type = 'PRIMARY KEY' \
                           AND tc.table_name = $1 \
                         ORDER BY kcu.ordinal_position",
                        &[&input.table_name],
                    )
                    .await
            })
            .await?;

        let output = match outcome {
            QueryOutcome::Empty => PrimaryKeysOutput {
                text: format!("No primary keys found for table '{}'.", input.table_name),
                table_name: input.table_name,
                primary_keys: Vec::new(),
                found: false,
            },
            QueryOutcome::Rows(rows) => {
                let primary_keys = collect_strings(&rows, "column_name")?;
                let text = primary_keys.join(", ");
                PrimaryKeysOutput {
                    table_name: input.table_name,
                    primary_keys,
                    found: true,
                    text,
                }
            }
        };

        info!(
            table_name = %output.table_name,
            keys = output.primary_keys.len(),
            "Primary keys inspected"
        );
        Ok(output)
    }

    /// Handle the get_distinct_values tool call.
    ///
    /// Identifiers are validated and quoted before interpolation; a missing
    /// table or column reports the documented "none found" text.
    pub async fn get_distinct_values(
        &self,
        input: DistinctValuesInput,
    ) -> DbResult<DistinctValuesOutput> {
        let table = quoted_identifier("table_name", &input.table_name)?;
        let column = quoted_identifier("column_name", &input.column_name)?;
        let schema = quoted_identifier("schema", &self.table_schema)?;
        let sql = format!("SELECT DISTINCT {column} FROM {schema}.{table}");

        let outcome = self
            .with_connection(async |conn| {
                let known = !self
                    .executor
                    .fetch_bound(
                        conn,
                        "SELECT 1 FROM information_schema.columns \
                         WHERE table_schema = $1 AND table_name = $2 AND column_name = $3",
                        &[&self.table_schema, &input.table_name, &input.column_name],
                    )
                    .await?
                    .is_empty();
                if !known {
                    return Ok(QueryOutcome::Empty);
                }
                self.executor.fetch(conn, &sql).await
            })
            .await?;

        let output = match outcome {
            QueryOutcome::Empty => DistinctValuesOutput {
                text: format!(
                    "No distinct values found in column '{}' of table '{}'.",
                    input.column_name, input.table_name
                ),
                table_name: input.table_name,
                column_name: input.column_name,
                values: Vec::new(),
                count: 0,
            },
            QueryOutcome::Rows(rows) => {
                let values: Vec<String> =
                    rows.iter().map(|r| render::render_value_at(r, 0)).collect();
                let text = values.join("\n");
                DistinctValuesOutput {
                    table_name: input.table_name,
                    column_name: input.column_name,
                    count: values.len(),
                    values,
                    text,
                }
            }
        };

        info!(
            table_name = %output.table_name,
            column_name = %output.column_name,
            count = output.count,
            "Distinct values fetched"
        );
        Ok(output)
    }

    /// Handle the get_table_relationships tool call.
    pub async fn get_table_relationships(&self) -> DbResult<RelationshipsOutput> {
        let outcome = self
            .with_connection(async |conn| {
                self.executor
                    .fetch(
                        conn,
                        "SELECT tc.constraint_name AS foreign_key, \
                                tc.table_name AS parent_table, \
                                kcu.column_name AS parent_column, \
                                ccu.table_name AS referenced_table, \
                                ccu.column_name AS referenced_column \
                         FROM information_schema.table_constraints tc \
                         JOIN information_schema.key_column_usage kcu \
                           ON tc.constraint_name = kcu.constraint_name \
                          AND tc.table_schema = kcu.table_schema \
                         JOIN information_schema.constraint_column_usage ccu \
                           ON tc.constraint_name = ccu.constraint_name \
                          AND tc.table_schema = ccu.table_schema \
                         WHERE tc.constraint_type = 'FOREIGN KEY' \
                         ORDER BY tc.table_name, tc.constraint_name",
                    )
                    .await
            })
            .await?;

        let output = match outcome {
            QueryOutcome::Empty => RelationshipsOutput {
                relationships: Vec::new(),
                count: 0,
                text: "No foreign key relationships found in the database.".to_string(),
            },
            QueryOutcome::Rows(rows) => {
                let mut relationships = Vec::with_capacity(rows.len());
                for row in &rows {
                    relationships.push(RelationshipOutput {
                        foreign_key: row.try_get("foreign_key").map_err(DbError::from)?,
                        parent_table: row.try_get("parent_table").map_err(DbError::from)?,
                        parent_column: row.try_get("parent_column").map_err(DbError::from)?,
                        referenced_table: row.try_get("referenced_table").map_err(DbError::from)?,
                        referenced_column: row
                            .try_get("referenced_column")
                            .map_err(DbError::from)?,
                    });
                }
                let text = relationships
                    .iter()
                    .map(format_relationship)
                    .collect::<Vec<_>>()
                    .join("\n");
                RelationshipsOutput {
                    count: relationships.len(),
                    relationships,
                    text,
                }
            }
        };

        info!(count = output.count, "Table relationships inspected");
        Ok(output)
    }
}

/// Format one relationship as "Foreign Key: K, P(pc) -> R(rc)".
fn format_relationship(rel: &RelationshipOutput) -> String {
    format!(
        "Foreign Key: {}, {}({}) -> {}({})",
        rel.foreign_key,
        rel.parent_table,
        rel.parent_column,
        rel.referenced_table,
        rel.referenced_column
    )
}

fn collect_columns(rows: &[sqlx::postgres::PgRow]) -> DbResult<Vec<ColumnTypeOutput>> {
    rows.iter()
        .map(|row| {
            Ok(ColumnTypeOutput {
                name: row.try_get("column_name").map_err(DbError::from)?,
                data_type: row.try_get("data_type").map_err(DbError::from)?,
            })
        })
        .collect()
}

fn collect_strings(rows: &[sqlx::postgres::PgRow], column: &str) -> DbResult<Vec<String>> {
    rows.iter()
        .map(|row| row.try_get(column).map_err(DbError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_input_deserialization() {
        let json = r#"{"table_name": "Customer"}"#;
        let input: TableNameInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.table_name, "Customer");
    }

    #[test]
    fn test_distinct_values_input_deserialization() {
        let json = r#"{"table_name": "Customer", "column_name": "CompanyName"}"#;
        let input: DistinctValuesInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.table_name, "Customer");
        assert_eq!(input.column_name, "CompanyName");
    }

    #[test]
    fn test_format_relationship() {
        let rel = RelationshipOutput {
            foreign_key: "FK_Order_Customer".to_string(),
            parent_table: "SalesOrderHeader".to_string(),
            parent_column: "CustomerID".to_string(),
            referenced_table: "Customer".to_string(),
            referenced_column: "CustomerID".to_string(),
        };
        assert_eq!(
            format_relationship(&rel),
            "Foreign Key: FK_Order_Customer, SalesOrderHeader(CustomerID) -> Customer(CustomerID)"
        );
    }

    #[test]
    fn test_not_found_texts_match_documented_messages() {
        let schema_out = TableSchemaOutput {
            table_name: "ghost".to_string(),
            columns: Vec::new(),
            found: false,
            text: format!("No schema found for table '{}'.", "ghost"),
        };
        assert_eq!(schema_out.text, "No schema found for table 'ghost'.");

        let keys_out = PrimaryKeysOutput {
            table_name: "ghost".to_string(),
            primary_keys: Vec::new(),
            found: false,
            text: format!("No primary keys found for table '{}'.", "ghost"),
        };
        assert_eq!(keys_out.text, "No primary keys found for table 'ghost'.");
    }

    #[test]
    fn test_output_serialization_includes_found_flag() {
        let output = TableSchemaOutput {
            table_name: "Customer".to_string(),
            columns: vec![ColumnTypeOutput {
                name: "CustomerID".to_string(),
                data_type: "integer".to_string(),
            }],
            found: true,
            text: "CustomerID: integer".to_string(),
        };
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"found\":true"));
        assert!(json.contains("CustomerID: integer"));
    }
}
