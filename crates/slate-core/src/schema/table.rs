//! Table and index descriptors.

use serde::{Deserialize, Serialize};

use super::column::ColumnDescriptor;

/// A declared index. Compared structurally (columns and uniqueness)
/// when diffing; the name is only used to create and drop it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name, unique across the schema.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// UNIQUE index.
    #[serde(default)]
    pub unique: bool,
}

impl IndexDescriptor {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(ToString::to_string).collect(),
            unique: false,
        }
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Structural equality: same column list and uniqueness.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.columns == other.columns && self.unique == other.unique
    }
}

/// Options of an FTS5 virtual table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtsOptions {
    /// `tokenize = '...'` argument, e.g. `porter unicode61`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
}

/// A declared table: ordered columns, indexes and optional full-text options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
    /// Declared indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDescriptor>,
    /// Present for FTS5 virtual tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fts: Option<FtsOptions>,
}

impl TableDescriptor {
    /// Creates an empty regular table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            fts: None,
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    /// Turns the table into an FTS5 virtual table.
    #[must_use]
    pub fn full_text(mut self, options: FtsOptions) -> Self {
        self.fts = Some(options);
        self
    }

    /// Returns `true` for FTS5 virtual tables.
    #[must_use]
    pub const fn is_full_text(&self) -> bool {
        self.fts.is_some()
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column_named(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Primary key columns in declaration order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    /// Declared indexes plus one implied index `idx_<table>_<column>`
    /// for every foreign key column that no declared index leads with.
    #[must_use]
    pub fn effective_indexes(&self) -> Vec<IndexDescriptor> {
        let mut indexes = self.indexes.clone();
        for column in &self.columns {
            if column.references.is_none() {
                continue;
            }
            let covered = self
                .indexes
                .iter()
                .any(|idx| idx.columns.first() == Some(&column.name));
            if !covered {
                indexes.push(IndexDescriptor::new(
                    format!("idx_{}_{}", self.name, column.name),
                    &[column.name.as_str()],
                ));
            }
        }
        indexes
    }
}

/// Implemented by `#[derive(Table)]` types.
pub trait Table {
    /// The row type (the original struct).
    type Row;

    /// The SQL table name.
    const NAME: &'static str;

    /// List of all column names.
    const COLUMNS: &'static [&'static str];

    /// The primary key column name, if it is a single column.
    const PRIMARY_KEY: Option<&'static str>;

    /// Builds the table descriptor.
    fn descriptor() -> TableDescriptor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, text};

    #[test]
    fn implied_fk_index_is_added_once() {
        let posts = TableDescriptor::new("posts")
            .column(integer("id").primary_key())
            .column(integer("author_id").references("users", "id"))
            .column(integer("editor_id").nullable().references("users", "id"))
            .index(IndexDescriptor::new("idx_posts_editor_date", &["editor_id", "id"]));

        let names: Vec<String> = posts
            .effective_indexes()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["idx_posts_editor_date", "idx_posts_author_id"]);
    }

    #[test]
    fn index_equivalence_ignores_names() {
        let a = IndexDescriptor::new("a", &["x", "y"]);
        let b = IndexDescriptor::new("b", &["x", "y"]);
        assert!(a.equivalent(&b));
        assert!(!a.equivalent(&b.clone().unique()));
        assert!(!a.equivalent(&IndexDescriptor::new("c", &["y", "x"])));
    }

    #[test]
    fn column_lookup() {
        let t = TableDescriptor::new("users")
            .column(integer("id").primary_key())
            .column(text("name"));
        assert_eq!(t.column_names(), vec!["id", "name"]);
        assert!(t.column_named("name").is_some());
        assert_eq!(t.primary_key().len(), 1);
    }
}
