//! INSERT, UPDATE and DELETE.

use std::collections::BTreeSet;

use crate::ast::{Expr, IntoExpr};
use crate::error::{CompileError, Result};
use crate::schema::{ColumnDescriptor, TableDescriptor};
use crate::value::{encode_for, ToValue, Value};

use super::compiler::{Clause, Ctx, Compiler};
use super::scope::{Scope, SourceColumns, Writer};
use super::{CompiledQuery, Statement};

/// Upsert behaviour of an [`Insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnConflict {
    /// `ON CONFLICT [(target)] DO NOTHING`
    DoNothing {
        /// Conflict target columns; empty means any constraint.
        target: Vec<String>,
    },
    /// `ON CONFLICT (target) DO UPDATE SET c = excluded.c, ...`
    DoUpdate {
        /// Conflict target columns.
        target: Vec<String>,
        /// Columns overwritten from the rejected row.
        columns: Vec<String>,
    },
}

/// An INSERT of one or more rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    rows: Vec<Vec<(String, Value)>>,
    on_conflict: Option<OnConflict>,
}

impl Insert {
    /// Starts an insert into `table` with no rows.
    #[must_use]
    pub fn into(table: &str) -> Self {
        Self {
            table: table.to_string(),
            rows: Vec::new(),
            on_conflict: None,
        }
    }

    /// Inserts every row of `rows`. Zero rows compile to the no-op
    /// sentinel.
    #[must_use]
    pub fn many<R, K>(table: &str, rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        rows.into_iter()
            .fold(Self::into(table), |insert, row| insert.row(row))
    }

    /// Sets a column of the current row, starting one if needed.
    #[must_use]
    pub fn value(mut self, column: &str, value: impl ToValue) -> Self {
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        if let Some(row) = self.rows.last_mut() {
            row.push((column.to_string(), value.to_value()));
        }
        self
    }

    /// Appends a full row.
    #[must_use]
    pub fn row<K: Into<String>>(mut self, row: impl IntoIterator<Item = (K, Value)>) -> Self {
        self.rows
            .push(row.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    /// `ON CONFLICT (target) DO NOTHING`; an empty target matches any
    /// constraint.
    #[must_use]
    pub fn on_conflict_do_nothing(mut self, target: &[&str]) -> Self {
        self.on_conflict = Some(OnConflict::DoNothing {
            target: target.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// `ON CONFLICT (target) DO UPDATE SET column = excluded.column, ...`
    #[must_use]
    pub fn on_conflict_update(mut self, target: &[&str], columns: &[&str]) -> Self {
        self.on_conflict = Some(OnConflict::DoUpdate {
            target: target.iter().map(ToString::to_string).collect(),
            columns: columns.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// Number of rows queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no rows are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Statement for Insert {
    fn compile_with(&self, compiler: &Compiler<'_>) -> Result<CompiledQuery> {
        let table = compiler.table(&self.table)?;
        let Some(first) = self.rows.first() else {
            return Ok(CompiledQuery::noop());
        };
        let columns: Vec<&str> = first.iter().map(|(c, _)| c.as_str()).collect();
        let expected: BTreeSet<&str> = columns.iter().copied().collect();
        if expected.len() != columns.len() {
            return Err(CompileError::InvalidInsert(format!(
                "row 0 sets a column of '{}' twice",
                self.table
            )));
        }
        let descriptors = columns
            .iter()
            .map(|c| column(table, c))
            .collect::<Result<Vec<_>>>()?;

        let mut w = Writer::default();
        w.push("INSERT INTO ");
        w.ident(&table.name);
        if columns.is_empty() {
            if self.rows.len() > 1 || self.on_conflict.is_some() {
                return Err(CompileError::InvalidInsert(
                    "rows without columns can only be inserted one at a time".into(),
                ));
            }
            w.push(" DEFAULT VALUES");
            return Ok(finish(w));
        }

        w.push(" (");
        w.list(&columns, |w, c| {
            w.ident(c);
            Ok(())
        })?;
        w.push(") VALUES ");
        for (i, row) in self.rows.iter().enumerate() {
            let names: BTreeSet<&str> = row.iter().map(|(c, _)| c.as_str()).collect();
            if names != expected || row.len() != columns.len() {
                return Err(CompileError::InvalidInsert(format!(
                    "row {i} sets different columns than row 0"
                )));
            }
            if i > 0 {
                w.push(", ");
            }
            w.push("(");
            w.list(&descriptors, |w, descriptor| {
                let value = row
                    .iter()
                    .find(|(c, _)| *c == descriptor.name)
                    .map_or(&Value::Null, |(_, v)| v);
                let label = format!("{}.{}", table.name, descriptor.name);
                w.bind(encode_for(&label, value, descriptor.ty)?);
                Ok(())
            })?;
            w.push(")");
        }

        match &self.on_conflict {
            None => {}
            Some(OnConflict::DoNothing { target }) => {
                w.push(" ON CONFLICT");
                conflict_target(table, target, &mut w)?;
                w.push(" DO NOTHING");
            }
            Some(OnConflict::DoUpdate { target, columns }) => {
                if target.is_empty() || columns.is_empty() {
                    return Err(CompileError::InvalidInsert(
                        "an upsert needs a conflict target and at least one column to update".into(),
                    ));
                }
                w.push(" ON CONFLICT");
                conflict_target(table, target, &mut w)?;
                w.push(" DO UPDATE SET ");
                w.list(columns, |w, c| {
                    column(table, c)?;
                    w.ident(c);
                    w.push(" = excluded.");
                    w.ident(c);
                    Ok(())
                })?;
            }
        }
        Ok(finish(w))
    }
}

/// An UPDATE of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    sets: Vec<(String, Expr)>,
    filters: Vec<Expr>,
}

impl Update {
    /// Starts an update of `table`.
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            sets: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// `SET column = value`, where the value is a literal or any
    /// expression over the table's columns.
    #[must_use]
    pub fn set(mut self, column: &str, value: impl IntoExpr) -> Self {
        self.sets.push((column.to_string(), value.into_expr()));
        self
    }

    /// Restricts the updated rows.
    #[must_use]
    pub fn filter(mut self, predicate: impl IntoExpr) -> Self {
        self.filters.push(predicate.into_expr());
        self
    }
}

impl Statement for Update {
    fn compile_with(&self, compiler: &Compiler<'_>) -> Result<CompiledQuery> {
        let table = compiler.table(&self.table)?;
        if self.sets.is_empty() {
            return Err(CompileError::EmptyUpdate(self.table.clone()));
        }
        let scope = table_scope(table)?;
        let ctx = Ctx {
            scope: &scope,
            outputs: &[],
            ctes: &[],
            allow_aliases: false,
        };
        let filters = conjuncts(&self.filters);
        for expr in &filters {
            compiler.analyze(&ctx, expr, Clause::Where)?;
        }

        let mut seen = BTreeSet::new();
        for (name, _) in &self.sets {
            column(table, name)?;
            if !seen.insert(name.as_str()) {
                return Err(CompileError::InvalidExpression(format!(
                    "column '{name}' is set twice"
                )));
            }
        }

        let mut w = Writer::default();
        w.push("UPDATE ");
        w.ident(&table.name);
        w.push(" SET ");
        w.list(&self.sets, |w, (name, expr)| {
            let descriptor = column(table, name)?;
            w.ident(name);
            w.push(" = ");
            if let Expr::Literal(value) = expr {
                let label = format!("{}.{}", table.name, descriptor.name);
                w.bind(encode_for(&label, value, descriptor.ty)?);
            } else {
                compiler.analyze(&ctx, expr, Clause::Set)?;
                compiler.render_expr(&ctx, expr, Clause::Set, w)?;
            }
            Ok(())
        })?;
        if !filters.is_empty() {
            w.push(" WHERE ");
            compiler.render_conjuncts(&ctx, &filters, Clause::Where, &mut w)?;
        }
        Ok(finish(w))
    }
}

/// A DELETE from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    filters: Vec<Expr>,
    all_rows: bool,
}

impl Delete {
    /// Starts a delete from `table`. Compiling it without a filter fails
    /// unless [`all_rows`](Self::all_rows) was called.
    #[must_use]
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filters: Vec::new(),
            all_rows: false,
        }
    }

    /// Restricts the deleted rows.
    #[must_use]
    pub fn filter(mut self, predicate: impl IntoExpr) -> Self {
        self.filters.push(predicate.into_expr());
        self
    }

    /// Deletes every row.
    #[must_use]
    pub const fn all_rows(mut self) -> Self {
        self.all_rows = true;
        self
    }
}

impl Statement for Delete {
    fn compile_with(&self, compiler: &Compiler<'_>) -> Result<CompiledQuery> {
        let table = compiler.table(&self.table)?;
        if self.filters.is_empty() && !self.all_rows {
            return Err(CompileError::UnfilteredDelete(self.table.clone()));
        }
        let scope = table_scope(table)?;
        let ctx = Ctx {
            scope: &scope,
            outputs: &[],
            ctes: &[],
            allow_aliases: false,
        };
        let filters = conjuncts(&self.filters);
        for expr in &filters {
            compiler.analyze(&ctx, expr, Clause::Where)?;
        }

        let mut w = Writer::default();
        w.push("DELETE FROM ");
        w.ident(&table.name);
        if !filters.is_empty() {
            w.push(" WHERE ");
            compiler.render_conjuncts(&ctx, &filters, Clause::Where, &mut w)?;
        }
        Ok(finish(w))
    }
}

fn table_scope(table: &TableDescriptor) -> Result<Scope<'_>> {
    let mut scope = Scope::default();
    scope.add(&table.name, SourceColumns::Table(table))?;
    Ok(scope)
}

fn conjuncts(filters: &[Expr]) -> Vec<Expr> {
    filters
        .iter()
        .flat_map(|f| f.clone().into_conjuncts())
        .collect()
}

fn column<'t>(table: &'t TableDescriptor, name: &str) -> Result<&'t ColumnDescriptor> {
    table
        .column_named(name)
        .ok_or_else(|| CompileError::UnresolvedColumn {
            table: table.name.clone(),
            column: name.to_string(),
        })
}

fn conflict_target(table: &TableDescriptor, target: &[String], w: &mut Writer) -> Result<()> {
    if target.is_empty() {
        return Ok(());
    }
    w.push(" (");
    w.list(target, |w, c| {
        column(table, c)?;
        w.ident(c);
        Ok(())
    })?;
    w.push(")");
    Ok(())
}

fn finish(w: Writer) -> CompiledQuery {
    CompiledQuery {
        sql: w.sql,
        binds: w.binds,
        result_columns: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{col, ExprOps};
    use crate::schema::{boolean, datetime, integer, real, text, SchemaSnapshot};
    use crate::value::SqlValue;

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot::from_tables(vec![TableDescriptor::new("users")
            .column(integer("id").primary_key().autoincrement())
            .column(text("email").unique())
            .column(real("score").nullable())
            .column(boolean("active"))
            .column(datetime("seen_at").nullable())])
        .unwrap()
    }

    #[test]
    fn insert_encodes_against_column_types() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let insert = Insert::into("users")
            .value("email", "a@example.com")
            .value("score", 3)
            .value("active", true)
            .value("seen_at", "2024-05-01 10:00:00");
        let compiled = compiler.compile(&insert).unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO \"users\" (\"email\", \"score\", \"active\", \"seen_at\") VALUES (?, ?, ?, ?)"
        );
        assert_eq!(
            compiled.binds,
            vec![
                SqlValue::Text("a@example.com".into()),
                SqlValue::Float(3.0),
                SqlValue::Int(1),
                SqlValue::Text("2024-05-01T10:00:00Z".into()),
            ]
        );
        assert!(!compiled.returns_rows());
    }

    #[test]
    fn insert_rejects_wrong_types_and_unknown_columns() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let err = compiler
            .compile(&Insert::into("users").value("active", "yes"))
            .unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));
        let err = compiler
            .compile(&Insert::into("users").value("nickname", "x"))
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnresolvedColumn {
                table: "users".into(),
                column: "nickname".into()
            }
        );
    }

    #[test]
    fn insert_many_with_zero_rows_is_noop() {
        let schema = schema();
        let rows: Vec<Vec<(&str, Value)>> = Vec::new();
        let compiled = Compiler::new(&schema)
            .compile(&Insert::many("users", rows))
            .unwrap();
        assert!(compiled.is_noop());
        assert!(compiled.binds.is_empty());
    }

    #[test]
    fn insert_many_reorders_and_rejects_inconsistent_rows() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let ok = Insert::many(
            "users",
            vec![
                vec![("email", "a".to_value()), ("active", true.to_value())],
                vec![("active", false.to_value()), ("email", "b".to_value())],
            ],
        );
        let compiled = compiler.compile(&ok).unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO \"users\" (\"email\", \"active\") VALUES (?, ?), (?, ?)"
        );
        assert_eq!(compiled.binds[2], SqlValue::Text("b".into()));
        assert_eq!(compiled.binds[3], SqlValue::Int(0));

        let bad = Insert::many(
            "users",
            vec![
                vec![("email", "a".to_value())],
                vec![("active", false.to_value())],
            ],
        );
        assert!(matches!(
            compiler.compile(&bad),
            Err(CompileError::InvalidInsert(_))
        ));
    }

    #[test]
    fn upserts() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let nothing = Insert::into("users")
            .value("email", "a")
            .value("active", true)
            .on_conflict_do_nothing(&["email"]);
        assert!(compiler
            .compile(&nothing)
            .unwrap()
            .sql
            .ends_with("VALUES (?, ?) ON CONFLICT (\"email\") DO NOTHING"));

        let update = Insert::into("users")
            .value("email", "a")
            .value("active", true)
            .on_conflict_update(&["email"], &["active"]);
        assert!(compiler
            .compile(&update)
            .unwrap()
            .sql
            .ends_with("ON CONFLICT (\"email\") DO UPDATE SET \"active\" = excluded.\"active\""));
    }

    #[test]
    fn update_mixes_literals_and_expressions() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let update = Update::table("users")
            .set("score", col("users", "score").add(1.5))
            .set("active", false)
            .filter(col("users", "id").eq(7_i64));
        let compiled = compiler.compile(&update).unwrap();
        assert_eq!(
            compiled.sql,
            "UPDATE \"users\" SET \"score\" = \"users\".\"score\" + ?, \"active\" = ? \
             WHERE \"users\".\"id\" = ?"
        );
        assert_eq!(
            compiled.binds,
            vec![SqlValue::Float(1.5), SqlValue::Int(0), SqlValue::Int(7)]
        );
        assert_eq!(
            compiler.compile(&Update::table("users")),
            Err(CompileError::EmptyUpdate("users".into()))
        );
    }

    #[test]
    fn update_rejects_unknown_and_repeated_columns() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        let twice = Update::table("users")
            .set("active", true)
            .set("score", 1.0)
            .set("active", false);
        assert_eq!(
            compiler.compile(&twice),
            Err(CompileError::InvalidExpression(
                "column 'active' is set twice".into()
            ))
        );
        assert_eq!(
            compiler.compile(&Update::table("users").set("missing", 1_i64)),
            Err(CompileError::UnresolvedColumn {
                table: "users".into(),
                column: "missing".into(),
            })
        );
    }

    #[test]
    fn delete_requires_a_filter_or_all_rows() {
        let schema = schema();
        let compiler = Compiler::new(&schema);
        assert_eq!(
            compiler.compile(&Delete::from("users")),
            Err(CompileError::UnfilteredDelete("users".into()))
        );
        assert_eq!(
            compiler.compile(&Delete::from("users").all_rows()).unwrap().sql,
            "DELETE FROM \"users\""
        );
        let filtered = Delete::from("users").filter(
            col("users", "active")
                .eq(false)
                .or(col("users", "score").lt(0.5)),
        );
        assert_eq!(
            compiler.compile(&filtered).unwrap().sql,
            "DELETE FROM \"users\" WHERE (\"users\".\"active\" = ? OR \"users\".\"score\" < ?)"
        );
    }
}
