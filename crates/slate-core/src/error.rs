//! Error types for compilation, schema validation and value decoding.

use crate::schema::ColumnType;

/// Errors raised while compiling a query, DML statement or full-text
/// match into SQL. Always raised before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A column reference does not resolve to any source in scope.
    #[error("unresolved column reference {table}.{column}")]
    UnresolvedColumn {
        /// Table, alias or subquery name the reference points at.
        table: String,
        /// Column name.
        column: String,
    },

    /// An output alias referenced in the query does not exist.
    #[error("unknown output alias '{0}'")]
    UnknownAlias(String),

    /// A table name is not part of the schema snapshot.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A function name outside the closed scalar library.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A function was called with the wrong number of arguments.
    #[error("function '{function}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        /// SQL name of the function.
        function: String,
        /// Human readable expected arity.
        expected: String,
        /// Number of arguments supplied.
        found: usize,
    },

    /// A window frame whose bounds cannot be expressed.
    #[error("invalid window frame: {0}")]
    InvalidFrame(String),

    /// A ranking or value function used without an OVER clause.
    #[error("window function '{0}' requires an OVER clause")]
    WindowRequired(String),

    /// An aggregate or window function where none is allowed.
    #[error("aggregate not allowed here: {0}")]
    MisplacedAggregate(String),

    /// A join whose sides cannot be attached to the current scope.
    #[error("invalid join: {0}")]
    InvalidJoin(String),

    /// A subquery registration or use that cannot be compiled.
    #[error("invalid subquery: {0}")]
    InvalidSubquery(String),

    /// Two sources in one query share a name.
    #[error("duplicate source '{0}' in query")]
    DuplicateSource(String),

    /// An expression with no valid SQL rendering, such as a CASE
    /// without branches.
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// Two output columns of one query share a name.
    #[error("duplicate output column '{0}'")]
    DuplicateOutput(String),

    /// A literal whose type does not fit the target column.
    #[error("type mismatch for {column}: expected {expected}, got {found}")]
    TypeMismatch {
        /// Column (or expression) receiving the value.
        column: String,
        /// Declared type of the column.
        expected: ColumnType,
        /// Kind of the offending value.
        found: &'static str,
    },

    /// Insert rows that disagree on their column set.
    #[error("invalid insert: {0}")]
    InvalidInsert(String),

    /// An UPDATE with nothing to set.
    #[error("update on '{0}' sets no columns")]
    EmptyUpdate(String),

    /// A DELETE without a filter that was not explicitly unbounded.
    #[error("delete from '{0}' has no filter; call all_rows() to delete every row")]
    UnfilteredDelete(String),

    /// A full-text match query that FTS5 cannot express.
    #[error("invalid match query: {0}")]
    InvalidMatch(String),

    /// A full-text operation against a regular table.
    #[error("table '{0}' is not a full-text table")]
    NotFullText(String),
}

/// Errors raised while building or loading a [`SchemaSnapshot`](crate::schema::SchemaSnapshot).
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two tables share a name.
    #[error("duplicate table '{0}'")]
    DuplicateTable(String),

    /// A table declares no columns.
    #[error("table '{0}' has no columns")]
    EmptyTable(String),

    /// Two columns of one table share a name.
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Two indexes in the schema share a name.
    #[error("duplicate index '{0}'")]
    DuplicateIndex(String),

    /// An index names a column its table does not have.
    #[error("index '{index}' on '{table}' references unknown column '{column}'")]
    UnknownIndexColumn {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
        /// Missing column.
        column: String,
    },

    /// A foreign key points at a table or column that does not exist.
    #[error("column {table}.{column} references unknown {target}")]
    UnknownReference {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
        /// The missing `table.column` target.
        target: String,
    },

    /// A foreign key points at a column that is neither a primary key nor unique.
    #[error("column {table}.{column} references {target}, which is not a primary key or unique")]
    ReferenceNotUnique {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
        /// The `table.column` target.
        target: String,
    },

    /// AUTOINCREMENT outside a sole INTEGER PRIMARY KEY.
    #[error("column {table}.{column} cannot be AUTOINCREMENT")]
    InvalidAutoincrement {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A full-text table declared with something FTS5 cannot store.
    #[error("full-text table '{table}': {reason}")]
    InvalidFullText {
        /// Table name.
        table: String,
        /// What is wrong.
        reason: String,
    },

    /// Snapshot (de)serialization failure.
    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while decoding a stored value into a typed [`Value`](crate::value::Value).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The stored value cannot represent the requested type.
    #[error("cannot decode {found} as {expected}")]
    TypeMismatch {
        /// Requested type.
        expected: ColumnType,
        /// Storage class of the stored value.
        found: &'static str,
    },

    /// Text that is not a recognised date/time format.
    #[error("invalid datetime '{0}'")]
    InvalidDateTime(String),

    /// Text that is not a JSON document.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// A typed accessor asked for a Rust type the value cannot become.
    #[error("cannot convert {found} into {target}")]
    Conversion {
        /// Rust type requested.
        target: &'static str,
        /// Kind of the value held.
        found: &'static str,
    },
}

/// Result alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
