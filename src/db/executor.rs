//! Statement execution on a borrowed per-call connection.
//!
//! Every statement runs under an explicit timeout so a hung query cannot block
//! its invocation indefinitely. Results come back as a tagged
//! [`QueryOutcome`] so callers distinguish "ran successfully, no data" from
//! failure without string matching.

use crate::error::{DbError, DbResult};
use sqlx::PgConnection;
use sqlx::postgres::PgRow;
use std::time::Duration;
use tracing::debug;

/// Tagged result of a fetch: either no rows or the collected row set.
pub enum QueryOutcome {
    Empty,
    Rows(Vec<PgRow>),
}

impl QueryOutcome {
    fn from_rows(rows: Vec<PgRow>) -> Self {
        if rows.is_empty() {
            Self::Empty
        } else {
            Self::Rows(rows)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Rows(rows) => rows.len(),
        }
    }
}

/// Executes single statements with a per-call timeout.
pub struct QueryExecutor {
    statement_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }

    /// The configured per-statement deadline.
    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Execute a statement without parameters and fetch all result rows.
    pub async fn fetch(&self, conn: &mut PgConnection, sql: &str) -> DbResult<QueryOutcome> {
        debug!(sql = %sql, "Executing statement");

        let rows = tokio::time::timeout(
            self.statement_timeout,
            sqlx::query(sql).fetch_all(&mut *conn),
        )
        .await
        .map_err(|_| self.timeout_error("query execution"))?
        .map_err(DbError::from)?;

        Ok(QueryOutcome::from_rows(rows))
    }

    /// Execute a statement binding the given text parameters ($1, $2, ...)
    /// and fetch all result rows.
    pub async fn fetch_bound(
        &self,
        conn: &mut PgConnection,
        sql: &str,
        params: &[&str],
    ) -> DbResult<QueryOutcome> {
        debug!(sql = %sql, params = params.len(), "Executing bound statement");

        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }

        let rows = tokio::time::timeout(self.statement_timeout, query.fetch_all(&mut *conn))
            .await
            .map_err(|_| self.timeout_error("query execution"))?
            .map_err(DbError::from)?;

        Ok(QueryOutcome::from_rows(rows))
    }

    fn timeout_error(&self, operation: &str) -> DbError {
        DbError::timeout(operation, self.statement_timeout.as_secs() as u32)
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(
            crate::config::DEFAULT_QUERY_TIMEOUT_SECS,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_timeout_setting() {
        let executor = QueryExecutor::new(Duration::from_secs(60));
        assert_eq!(executor.statement_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_executor_default_timeout() {
        let executor = QueryExecutor::default();
        assert_eq!(executor.statement_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_outcome_tags_empty_row_sets() {
        let outcome = QueryOutcome::from_rows(Vec::new());
        assert!(outcome.is_empty());
        assert_eq!(outcome.row_count(), 0);
    }
}
