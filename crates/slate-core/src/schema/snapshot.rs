//! Immutable, validated schema snapshots.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::column::ColumnType;
use super::table::{Table, TableDescriptor};
use crate::error::SchemaError;

/// One complete state of the database schema.
///
/// Tables are keyed by name so iteration (and everything derived from
/// it: diffs, DDL, JSON) is deterministic. Snapshots can only be built
/// through validation and are never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, TableDescriptor>,
}

impl SchemaSnapshot {
    /// The empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from table descriptors, validating them as a whole.
    pub fn from_tables(tables: impl IntoIterator<Item = TableDescriptor>) -> Result<Self, SchemaError> {
        let mut map = BTreeMap::new();
        for table in tables {
            let name = table.name.clone();
            if map.insert(name.clone(), table).is_some() {
                return Err(SchemaError::DuplicateTable(name));
            }
        }
        let snapshot = Self { tables: map };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Returns a new snapshot with `table` added.
    pub fn with_table(&self, table: TableDescriptor) -> Result<Self, SchemaError> {
        Self::from_tables(self.tables.values().cloned().chain(std::iter::once(table)))
    }

    /// Returns a new snapshot with the descriptor of a derived table added.
    pub fn with<T: Table>(&self) -> Result<Self, SchemaError> {
        self.with_table(T::descriptor())
    }

    /// Looks up a table.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    /// Iterates tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    /// Table names in order.
    #[must_use]
    pub fn table_names(&self) -> BTreeSet<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes and validates a snapshot.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let snapshot: Self = serde_json::from_str(json)?;
        for (key, table) in &snapshot.tables {
            if key != &table.name {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let mut index_names = BTreeSet::new();
        for table in self.tables.values() {
            validate_table(table)?;
            for index in table.effective_indexes() {
                if !index_names.insert(index.name.clone()) {
                    return Err(SchemaError::DuplicateIndex(index.name));
                }
            }
            self.validate_references(table)?;
        }
        Ok(())
    }

    fn validate_references(&self, table: &TableDescriptor) -> Result<(), SchemaError> {
        for column in &table.columns {
            let Some(fk) = &column.references else {
                continue;
            };
            let target = format!("{}.{}", fk.table, fk.column);
            let unknown = || SchemaError::UnknownReference {
                table: table.name.clone(),
                column: column.name.clone(),
                target: target.clone(),
            };
            let parent = self.tables.get(&fk.table).ok_or_else(unknown)?;
            let parent_column = parent.column_named(&fk.column).ok_or_else(unknown)?;
            let sole_pk = parent_column.primary_key && parent.primary_key().len() == 1;
            let unique_index = parent
                .indexes
                .iter()
                .any(|idx| idx.unique && idx.columns == [fk.column.clone()]);
            if !(sole_pk || parent_column.unique || unique_index) {
                return Err(SchemaError::ReferenceNotUnique {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    target,
                });
            }
        }
        Ok(())
    }
}

fn validate_table(table: &TableDescriptor) -> Result<(), SchemaError> {
    if table.columns.is_empty() {
        return Err(SchemaError::EmptyTable(table.name.clone()));
    }

    let mut seen = BTreeSet::new();
    for column in &table.columns {
        if !seen.insert(column.name.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                table: table.name.clone(),
                column: column.name.clone(),
            });
        }
    }

    for index in &table.indexes {
        for column in &index.columns {
            if !seen.contains(column.as_str()) {
                return Err(SchemaError::UnknownIndexColumn {
                    table: table.name.clone(),
                    index: index.name.clone(),
                    column: column.clone(),
                });
            }
        }
    }

    let pk_count = table.primary_key().len();
    for column in table.columns.iter().filter(|c| c.autoincrement) {
        if !column.primary_key || pk_count != 1 || column.ty != ColumnType::Integer {
            return Err(SchemaError::InvalidAutoincrement {
                table: table.name.clone(),
                column: column.name.clone(),
            });
        }
    }

    if table.is_full_text() {
        let invalid = |reason: String| SchemaError::InvalidFullText {
            table: table.name.clone(),
            reason,
        };
        if !table.indexes.is_empty() {
            return Err(invalid("indexes are not supported".to_string()));
        }
        for column in &table.columns {
            if column.ty != ColumnType::Text {
                return Err(invalid(format!("column '{}' must be text", column.name)));
            }
            if column.primary_key
                || column.unique
                || column.check.is_some()
                || column.references.is_some()
                || column.default.is_some()
            {
                return Err(invalid(format!(
                    "column '{}' cannot carry constraints",
                    column.name
                )));
            }
        }
    }

    Ok(())
}
