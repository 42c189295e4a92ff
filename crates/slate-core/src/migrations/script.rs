//! The differ's output: ordered operations plus warnings.

use serde::Serialize;

use super::ddl::SqliteDialect;
use super::diff::DiffWarning;
use super::operation::MigrationOp;

/// An ordered list of migration operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationScript {
    /// Operations in execution order.
    pub ops: Vec<MigrationOp>,
    /// Changes the differ noticed but did not act on.
    pub warnings: Vec<DiffWarning>,
}

impl MigrationScript {
    /// Returns `true` if there are no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns `true` if any operation drops a table, drops a column or
    /// rebuilds a table.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.ops.iter().any(MigrationOp::is_destructive)
    }

    /// SQL statements, one per element, without terminators.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        let dialect = SqliteDialect::new();
        self.ops.iter().flat_map(|op| dialect.statements(op)).collect()
    }

    /// The whole script as SQL text, each statement ending in `;`.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.statements()
            .into_iter()
            .map(|s| format!("{s};\n"))
            .collect()
    }
}
