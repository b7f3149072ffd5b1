//! SQL identifier validation.
//!
//! Table and column names cannot be bound as query parameters, so every
//! caller-supplied identifier is checked against an allow-list before it is
//! used in SQL text. Anything outside `[A-Za-z0-9_]` is rejected with a
//! `DbError::Validation` before any statement is issued. The same check is
//! applied to identifiers that are bound as parameters, keeping the contract
//! uniform across all introspection tools.

use crate::error::{DbError, DbResult};

/// PostgreSQL truncates identifiers beyond 63 bytes; longer input is noise.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Validate a caller-supplied table/column/schema name.
///
/// `kind` names the argument in error messages (e.g. "table_name").
pub fn validate_identifier(kind: &str, name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::validation(format!("{kind} must not be empty")));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::validation(format!(
            "{kind} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if let Some(bad) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(DbError::validation(format!(
            "{kind} contains disallowed character {bad:?}; only [A-Za-z0-9_] is accepted"
        )));
    }
    Ok(())
}

/// Validate an identifier and return it wrapped in double quotes for safe
/// interpolation into SQL text.
pub fn quoted_identifier(kind: &str, name: &str) -> DbResult<String> {
    validate_identifier(kind, name)?;
    Ok(format!("\"{name}\""))
}
