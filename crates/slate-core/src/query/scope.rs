//! Name resolution for the sources visible in one SELECT, and the SQL
//! buffer the compiler renders into.

use crate::ast::ColumnRef;
use crate::dialect::{qualified, quote_identifier};
use crate::error::{CompileError, Result};
use crate::schema::{ColumnType, TableDescriptor};
use crate::value::SqlValue;

use super::ResultColumn;

/// Columns of one source in scope.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SourceColumns<'c> {
    Table(&'c TableDescriptor),
    Subquery(&'c [ResultColumn]),
}

impl<'c> SourceColumns<'c> {
    fn column_type(self, column: &str) -> Option<ColumnType> {
        match self {
            Self::Table(table) => table.column_named(column).map(|c| c.ty),
            Self::Subquery(columns) => columns.iter().find(|c| c.name == column).map(|c| c.ty),
        }
    }

    /// Every column, in declaration or projection order.
    pub(crate) fn all(self) -> Vec<ResultColumn> {
        match self {
            Self::Table(table) => table
                .columns
                .iter()
                .map(|c| ResultColumn {
                    name: c.name.clone(),
                    ty: c.ty,
                })
                .collect(),
            Self::Subquery(columns) => columns.to_vec(),
        }
    }

    pub(crate) const fn table(self) -> Option<&'c TableDescriptor> {
        match self {
            Self::Table(table) => Some(table),
            Self::Subquery(_) => None,
        }
    }
}

/// The sources a SELECT can reference, in the order they were joined.
#[derive(Debug, Default)]
pub(crate) struct Scope<'c> {
    sources: Vec<(String, SourceColumns<'c>)>,
}

impl<'c> Scope<'c> {
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.sources.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn add(&mut self, name: &str, columns: SourceColumns<'c>) -> Result<()> {
        if self.contains(name) {
            return Err(CompileError::DuplicateSource(name.to_string()));
        }
        self.sources.push((name.to_string(), columns));
        Ok(())
    }

    pub(crate) fn source(&self, name: &str) -> Option<SourceColumns<'c>> {
        self.sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, columns)| *columns)
    }

    /// Resolves a column reference to its declared type.
    pub(crate) fn column_type(&self, column: &ColumnRef) -> Result<ColumnType> {
        self.source(&column.source)
            .and_then(|source| source.column_type(&column.column))
            .ok_or_else(|| CompileError::UnresolvedColumn {
                table: column.source.clone(),
                column: column.column.clone(),
            })
    }
}

/// SQL text plus the binds collected while rendering it.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    pub(crate) sql: String,
    pub(crate) binds: Vec<SqlValue>,
}

impl Writer {
    pub(crate) fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub(crate) fn ident(&mut self, name: &str) {
        self.sql.push_str(&quote_identifier(name));
    }

    pub(crate) fn column(&mut self, column: &ColumnRef) {
        self.sql.push_str(&qualified(&column.source, &column.column));
    }

    /// Appends a `?` placeholder bound to `value`.
    pub(crate) fn bind(&mut self, value: SqlValue) {
        self.sql.push('?');
        self.binds.push(value);
    }

    /// Renders `items` separated by `", "`.
    pub(crate) fn list<T>(
        &mut self,
        items: &[T],
        mut render: impl FnMut(&mut Self, &T) -> Result<()>,
    ) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            render(self, item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, text};

    #[test]
    fn resolves_columns_by_source() {
        let users = TableDescriptor::new("users")
            .column(integer("id").primary_key())
            .column(text("name"));
        let mut scope = Scope::default();
        scope.add("u", SourceColumns::Table(&users)).unwrap();

        assert_eq!(
            scope.column_type(&ColumnRef::new("u", "name")).unwrap(),
            ColumnType::Text
        );
        assert_eq!(
            scope.column_type(&ColumnRef::new("users", "name")),
            Err(CompileError::UnresolvedColumn {
                table: "users".into(),
                column: "name".into()
            })
        );
        assert_eq!(
            scope.add("u", SourceColumns::Table(&users)),
            Err(CompileError::DuplicateSource("u".into()))
        );
    }

    #[test]
    fn writer_collects_binds_in_order() {
        let mut w = Writer::default();
        w.ident("t");
        w.push(" = ");
        w.bind(SqlValue::Int(1));
        w.push(" AND ");
        w.bind(SqlValue::Text("x".into()));
        assert_eq!(w.sql, "\"t\" = ? AND ?");
        assert_eq!(w.binds, vec![SqlValue::Int(1), SqlValue::Text("x".into())]);
    }
}
