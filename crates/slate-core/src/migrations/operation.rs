//! Migration operations.
//!
//! Each variant is one step of a [`MigrationScript`](super::MigrationScript);
//! the SQL for it comes from [`SqliteDialect`](super::SqliteDialect).

use std::fmt;

use serde::Serialize;

use crate::schema::{ColumnDescriptor, DefaultValue, IndexDescriptor, TableDescriptor};

/// All operations the differ can emit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOp {
    /// Create a table. Its indexes follow as separate [`MigrationOp::CreateIndex`] ops.
    CreateTable(TableDescriptor),
    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
    },
    /// `ALTER TABLE ... ADD COLUMN`.
    AddColumn {
        /// Table name.
        table: String,
        /// The new column.
        column: ColumnDescriptor,
    },
    /// `ALTER TABLE ... DROP COLUMN`.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// `ALTER TABLE ... RENAME COLUMN`.
    RenameColumn {
        /// Table name.
        table: String,
        /// Old column name.
        from: String,
        /// New column name.
        to: String,
    },
    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// The index.
        index: IndexDescriptor,
    },
    /// Drop an index.
    DropIndex {
        /// Table the index belonged to.
        table: String,
        /// Index name.
        name: String,
    },
    /// Rebuild a table through a temporary copy.
    RecreateTable {
        /// The new definition.
        table: TableDescriptor,
        /// Columns carried over from the old table.
        copy: Vec<CopyColumn>,
        /// Old columns whose data is discarded.
        dropped: Vec<String>,
        /// What forced the rebuild.
        reason: RecreateReason,
    },
}

impl MigrationOp {
    /// Name of the table the operation touches.
    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::CreateTable(table) | Self::RecreateTable { table, .. } => &table.name,
            Self::DropTable { name } => name,
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. } => table,
        }
    }

    /// Returns `true` for operations that may lose data: dropped tables,
    /// dropped columns and table rebuilds.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropTable { .. } | Self::DropColumn { .. } | Self::RecreateTable { .. }
        )
    }
}

/// One column copied during a table rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyColumn {
    /// Column in the new table.
    pub target: String,
    /// Column in the old table (differs from `target` for renames).
    pub source: String,
    /// Substituted for NULLs when the column became NOT NULL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<DefaultValue>,
}

/// Why a table had to be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum RecreateReason {
    /// The definition of an existing column changed.
    ColumnChanged(String),
    /// A column was added that `ADD COLUMN` cannot express.
    ColumnAdded(String),
    /// A column was dropped that `DROP COLUMN` cannot express.
    ColumnDropped(String),
    /// Full-text options changed.
    FullTextChanged,
}

impl fmt::Display for RecreateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnChanged(c) => write!(f, "column '{c}' changed"),
            Self::ColumnAdded(c) => write!(f, "column '{c}' cannot be added in place"),
            Self::ColumnDropped(c) => write!(f, "column '{c}' cannot be dropped in place"),
            Self::FullTextChanged => f.write_str("full-text options changed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::text;

    #[test]
    fn destructiveness_by_variant() {
        assert!(MigrationOp::DropTable { name: "t".into() }.is_destructive());
        assert!(!MigrationOp::AddColumn {
            table: "t".into(),
            column: text("bio").nullable(),
        }
        .is_destructive());
        assert!(!MigrationOp::RenameColumn {
            table: "t".into(),
            from: "a".into(),
            to: "b".into(),
        }
        .is_destructive());
        let recreate = MigrationOp::RecreateTable {
            table: TableDescriptor::new("t").column(text("a")),
            copy: vec![],
            dropped: vec![],
            reason: RecreateReason::FullTextChanged,
        };
        assert!(recreate.is_destructive());
        assert_eq!(recreate.table_name(), "t");
    }

    #[test]
    fn reason_display() {
        assert_eq!(
            RecreateReason::ColumnChanged("email".into()).to_string(),
            "column 'email' changed"
        );
    }
}
