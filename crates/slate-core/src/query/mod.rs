//! Query definitions and their compilation into parameterized SQL.
//!
//! A [`Query`] is plain data describing a SELECT. A [`Compiler`] bound
//! to a [`SchemaSnapshot`](crate::schema::SchemaSnapshot) resolves every
//! column reference, types every output column and renders SQL in which
//! every value is a `?` bind:
//!
//! ```rust
//! use slate_core::ast::{col, ExprOps};
//! use slate_core::query::{Compiler, Join, Query};
//! use slate_core::schema::{integer, text, SchemaSnapshot, TableDescriptor};
//!
//! let schema = SchemaSnapshot::from_tables(vec![
//!     TableDescriptor::new("users")
//!         .column(integer("id").primary_key())
//!         .column(text("name")),
//!     TableDescriptor::new("posts")
//!         .column(integer("id").primary_key())
//!         .column(integer("author_id").references("users", "id")),
//! ])
//! .unwrap();
//!
//! let query = Query::from("users")
//!     .select("name", col("users", "name"))
//!     .select("post", col("posts", "id"))
//!     .join(Join::left(col("users", "id"), col("posts", "author_id")))
//!     .filter(col("users", "name").ne("root"));
//!
//! let compiled = Compiler::new(&schema).compile(&query).unwrap();
//! assert_eq!(
//!     compiled.sql,
//!     "SELECT \"users\".\"name\" AS \"name\", \"posts\".\"id\" AS \"post\" FROM \"users\" \
//!      LEFT JOIN \"posts\" ON \"users\".\"id\" = \"posts\".\"author_id\" \
//!      WHERE \"users\".\"name\" <> ?"
//! );
//! ```

mod compiler;
mod dml;
mod scope;

pub(crate) use scope::Writer;

use crate::ast::{ColumnRef, Expr, IntoExpr, OrderTerm, SubqueryRef};
use crate::error::Result;
use crate::schema::ColumnType;
use crate::value::SqlValue;

pub use compiler::Compiler;
pub use dml::{Delete, Insert, OnConflict, Update};

/// A typed output column of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    /// Output name.
    pub name: String,
    /// Type used to decode values.
    pub ty: ColumnType,
}

/// Compiled SQL, its binds in order and the output column types.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Bind values, in placeholder order.
    pub binds: Vec<SqlValue>,
    /// Output columns; empty for statements that return no rows.
    pub result_columns: Vec<ResultColumn>,
}

impl CompiledQuery {
    /// The no-op sentinel (for instance an insert of zero rows).
    #[must_use]
    pub const fn noop() -> Self {
        Self {
            sql: String::new(),
            binds: Vec::new(),
            result_columns: Vec::new(),
        }
    }

    /// Returns `true` for the no-op sentinel.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.sql.is_empty()
    }

    /// Returns `true` if the statement produces rows.
    #[must_use]
    pub fn returns_rows(&self) -> bool {
        !self.result_columns.is_empty()
    }
}

/// Anything a [`Compiler`] can turn into a [`CompiledQuery`].
pub trait Statement {
    /// Compiles `self` against the compiler's schema and subqueries.
    fn compile_with(&self, compiler: &Compiler<'_>) -> Result<CompiledQuery>;
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
}

impl JoinKind {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// A join on one or more column equalities.
///
/// The joined source is whichever side of the first pair is not yet in
/// scope; its name must be a table, a registered subquery, or an alias
/// declared with [`Join::aliasing`].
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) pairs: Vec<(ColumnRef, ColumnRef)>,
    pub(crate) table: Option<String>,
}

impl Join {
    /// `INNER JOIN ... ON left = right`.
    #[must_use]
    pub fn inner(left: ColumnRef, right: ColumnRef) -> Self {
        Self::on_pairs(vec![(left, right)], JoinKind::Inner)
    }

    /// `LEFT JOIN ... ON left = right`.
    #[must_use]
    pub fn left(left: ColumnRef, right: ColumnRef) -> Self {
        Self::on_pairs(vec![(left, right)], JoinKind::Left)
    }

    /// Multi-column join, pairs rendered in the given order.
    #[must_use]
    pub const fn on_pairs(pairs: Vec<(ColumnRef, ColumnRef)>, kind: JoinKind) -> Self {
        Self {
            kind,
            pairs,
            table: None,
        }
    }

    /// Declares the joined source name as an alias of `table`, for
    /// self-joins.
    #[must_use]
    pub fn aliasing(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }
}

/// A SELECT query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) from: String,
    pub(crate) from_alias: Option<String>,
    pub(crate) select: Vec<(String, Expr)>,
    pub(crate) joins: Vec<Join>,
    pub(crate) filters: Vec<Expr>,
    pub(crate) group_by: Vec<Expr>,
    pub(crate) having: Vec<Expr>,
    pub(crate) order_by: Vec<OrderTerm>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) distinct: bool,
}

impl Query {
    /// Selects from a table or a registered subquery.
    #[must_use]
    pub fn from(source: &str) -> Self {
        Self {
            from: source.to_string(),
            from_alias: None,
            select: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        }
    }

    /// Selects from `table AS alias`.
    #[must_use]
    pub fn from_aliased(table: &str, alias: &str) -> Self {
        let mut query = Self::from(table);
        query.from_alias = Some(alias.to_string());
        query
    }

    /// Selects from a registered subquery.
    #[must_use]
    pub fn from_subquery(subquery: &SubqueryRef) -> Self {
        Self::from(subquery.alias())
    }

    /// Adds an output column. Without any, every column of the FROM
    /// source is projected under its own name.
    #[must_use]
    pub fn select(mut self, name: &str, expr: impl IntoExpr) -> Self {
        self.select.push((name.to_string(), expr.into_expr()));
        self
    }

    /// Adds a join.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Adds a predicate. Conjuncts over aggregates are routed to HAVING,
    /// the rest to WHERE.
    #[must_use]
    pub fn filter(mut self, predicate: impl IntoExpr) -> Self {
        self.filters.push(predicate.into_expr());
        self
    }

    /// Adds a GROUP BY expression.
    #[must_use]
    pub fn group_by(mut self, expr: impl IntoExpr) -> Self {
        self.group_by.push(expr.into_expr());
        self
    }

    /// Adds a predicate that always goes to HAVING.
    #[must_use]
    pub fn having(mut self, predicate: impl IntoExpr) -> Self {
        self.having.push(predicate.into_expr());
        self
    }

    /// Adds an ascending ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, expr: impl IntoExpr) -> Self {
        self.order_by.push(OrderTerm {
            expr: expr.into_expr(),
            desc: false,
        });
        self
    }

    /// Adds a descending ORDER BY term.
    #[must_use]
    pub fn order_by_desc(mut self, expr: impl IntoExpr) -> Self {
        self.order_by.push(OrderTerm {
            expr: expr.into_expr(),
            desc: true,
        });
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds DISTINCT.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Name the FROM source is visible under.
    pub(crate) fn from_scope_name(&self) -> &str {
        self.from_alias.as_deref().unwrap_or(&self.from)
    }
}

impl Statement for Query {
    fn compile_with(&self, compiler: &Compiler<'_>) -> Result<CompiledQuery> {
        compiler.compile_select(self)
    }
}
