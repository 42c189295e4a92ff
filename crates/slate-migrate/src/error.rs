//! Error types for migration execution.

use slate_core::SchemaError;
use slate_runtime::RuntimeError;

/// Errors that can occur while applying or recording a migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A statement failed. Everything before it was rolled back.
    #[error("Statement {index} failed: {source}\n  {sql}")]
    Statement {
        /// Zero-based position of the statement in the script.
        index: usize,
        /// The statement text.
        sql: String,
        /// The engine error.
        source: sqlx::Error,
    },

    /// `PRAGMA foreign_key_check` reported dangling references after the
    /// script ran. The script was rolled back.
    #[error("Foreign key check failed:\n{}", .0.iter().map(|v| format!("  - {v}")).collect::<Vec<_>>().join("\n"))]
    ForeignKeyCheck(Vec<String>),

    /// The script drops or rebuilds tables and destructive changes were
    /// not allowed.
    #[error("Refusing destructive migration of: {}", .0.join(", "))]
    DestructiveRefused(Vec<String>),

    /// Error from the runtime.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A stored or supplied snapshot is invalid.
    #[error("Invalid schema: {0}")]
    Schema(#[from] SchemaError),

    /// Database error outside the script itself.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (reading scripts or snapshots).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_names_position_and_sql() {
        let err = MigrateError::Statement {
            index: 2,
            sql: "DROP TABLE \"missing\"".into(),
            source: sqlx::Error::RowNotFound,
        };
        let message = err.to_string();
        assert!(message.starts_with("Statement 2 failed"));
        assert!(message.ends_with("DROP TABLE \"missing\""));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_foreign_key_check_lists_violations() {
        let err = MigrateError::ForeignKeyCheck(vec![
            "posts row 3 references users".into(),
            "posts row 4 references users".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Foreign key check failed:\n  - posts row 3 references users\n  - posts row 4 references users"
        );
    }

    #[test]
    fn test_destructive_refused_names_tables() {
        let err = MigrateError::DestructiveRefused(vec!["users".into(), "legacy".into()]);
        assert_eq!(
            err.to_string(),
            "Refusing destructive migration of: users, legacy"
        );
    }
}
