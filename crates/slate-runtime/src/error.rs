//! Error types for the runtime.

use std::fmt;

use slate_core::{CompileError, DecodeError};
use sqlx::error::{DatabaseError, ErrorKind};

/// SQLite's primary result code for constraint failures.
const SQLITE_CONSTRAINT: i32 = 19;

/// Which kind of constraint the engine reported as violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// UNIQUE or PRIMARY KEY.
    Unique,
    /// FOREIGN KEY.
    ForeignKey,
    /// NOT NULL.
    NotNull,
    /// CHECK.
    Check,
    /// Any other constraint failure (triggers, `RAISE`, ...).
    Other,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unique => "unique",
            Self::ForeignKey => "foreign key",
            Self::NotNull => "not null",
            Self::Check => "check",
            Self::Other => "other",
        })
    }
}

/// Errors raised while executing compiled statements.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The statement did not compile. Nothing was executed.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// A stored value could not be decoded as its result column type.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The engine rejected a write because of a constraint.
    #[error("{kind} constraint violated: {message}")]
    ConstraintViolation {
        /// Constraint category.
        kind: ConstraintKind,
        /// Message as reported by the engine.
        message: String,
    },

    /// Any other database or driver error.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// [`Row::get`](crate::Row::get) asked for a column the row does not have.
    #[error("no column named '{0}' in row")]
    MissingColumn(String),
}

impl RuntimeError {
    /// The violated constraint, if this is a constraint violation.
    #[must_use]
    pub const fn constraint(&self) -> Option<ConstraintKind> {
        match self {
            Self::ConstraintViolation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for RuntimeError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db) => constraint_kind(db.as_ref()),
            _ => None,
        };
        match (kind, err) {
            (Some(kind), sqlx::Error::Database(db)) => Self::ConstraintViolation {
                kind,
                message: db.message().to_string(),
            },
            (_, err) => Self::Database(err),
        }
    }
}

fn constraint_kind(err: &dyn DatabaseError) -> Option<ConstraintKind> {
    match err.kind() {
        ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
        ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
        ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
        ErrorKind::CheckViolation => Some(ConstraintKind::Check),
        _ => {
            // extended result codes keep the primary code in the low byte
            let code = err.code().and_then(|c| c.parse::<i32>().ok())?;
            (code & 0xff == SQLITE_CONSTRAINT).then_some(ConstraintKind::Other)
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_kind_display() {
        assert_eq!(ConstraintKind::ForeignKey.to_string(), "foreign key");
        let err = RuntimeError::ConstraintViolation {
            kind: ConstraintKind::Unique,
            message: "UNIQUE constraint failed: users.email".into(),
        };
        assert_eq!(
            err.to_string(),
            "unique constraint violated: UNIQUE constraint failed: users.email"
        );
        assert_eq!(err.constraint(), Some(ConstraintKind::Unique));
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = RuntimeError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RuntimeError::Database(sqlx::Error::RowNotFound)));
        assert_eq!(err.constraint(), None);
    }
}
