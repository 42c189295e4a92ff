//! Statement execution shared by [`Database`](crate::Database) and
//! [`Transaction`](crate::Transaction).
//!
//! Everything here is generic over [`sqlx::Executor`], so the pool, a
//! pooled connection and an open transaction all run statements through
//! the same code.

use std::sync::Arc;

use slate_core::query::CompiledQuery;
use slate_core::value::SqlValue;
use sqlx::sqlite::{SqliteArguments, SqliteConnection};
use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::error::Result;
use crate::row::Row;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// One operation of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// A statement whose rows are returned.
    Query(CompiledQuery),
    /// A statement whose affected-row count is returned.
    Execute(CompiledQuery),
}

impl From<CompiledQuery> for BatchOp {
    /// Row-returning statements become [`BatchOp::Query`], the rest
    /// [`BatchOp::Execute`].
    fn from(query: CompiledQuery) -> Self {
        if query.returns_rows() {
            Self::Query(query)
        } else {
            Self::Execute(query)
        }
    }
}

/// The result of one [`BatchOp`], in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    /// Rows of a [`BatchOp::Query`].
    Rows(Vec<Row>),
    /// Affected-row count of a [`BatchOp::Execute`].
    Affected(u64),
}

impl BatchResult {
    /// The rows, if this is a query result.
    #[must_use]
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected(_) => None,
        }
    }

    /// The affected-row count, if this is an execute result.
    #[must_use]
    pub const fn affected(&self) -> Option<u64> {
        match self {
            Self::Affected(n) => Some(*n),
            Self::Rows(_) => None,
        }
    }
}

fn bind_all<'q>(sql: &'q str, binds: &[SqlValue]) -> SqliteQuery<'q> {
    binds
        .iter()
        .fold(sqlx::query(sql), |query, value| match value {
            SqlValue::Null => query.bind(Option::<i64>::None),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.clone()),
            SqlValue::Blob(b) => query.bind(b.clone()),
        })
}

fn column_names(query: &CompiledQuery) -> Arc<[String]> {
    query.result_columns.iter().map(|c| c.name.clone()).collect()
}

pub(crate) async fn fetch_all<'c, E>(executor: E, query: &CompiledQuery) -> Result<Vec<Row>>
where
    E: Executor<'c, Database = Sqlite>,
{
    if query.is_noop() {
        return Ok(Vec::new());
    }
    debug!(sql = %query.sql, binds = query.binds.len(), "fetch");
    let rows = bind_all(&query.sql, &query.binds).fetch_all(executor).await?;
    let columns = column_names(query);
    rows.iter()
        .map(|row| Row::decode(row, &columns, &query.result_columns))
        .collect()
}

pub(crate) async fn fetch_optional<'c, E>(executor: E, query: &CompiledQuery) -> Result<Option<Row>>
where
    E: Executor<'c, Database = Sqlite>,
{
    if query.is_noop() {
        return Ok(None);
    }
    debug!(sql = %query.sql, binds = query.binds.len(), "fetch one");
    let row = bind_all(&query.sql, &query.binds)
        .fetch_optional(executor)
        .await?;
    row.map(|row| Row::decode(&row, &column_names(query), &query.result_columns))
        .transpose()
}

pub(crate) async fn execute<'c, E>(executor: E, query: &CompiledQuery) -> Result<u64>
where
    E: Executor<'c, Database = Sqlite>,
{
    if query.is_noop() {
        return Ok(0);
    }
    debug!(sql = %query.sql, binds = query.binds.len(), "execute");
    let done = bind_all(&query.sql, &query.binds).execute(executor).await?;
    Ok(done.rows_affected())
}

/// Runs `ops` in order on one connection, stopping at the first error.
/// The caller owns the enclosing transaction.
pub(crate) async fn run_batch(conn: &mut SqliteConnection, ops: Vec<BatchOp>) -> Result<Vec<BatchResult>> {
    let mut results = Vec::with_capacity(ops.len());
    for op in ops {
        let result = match op {
            BatchOp::Query(query) => BatchResult::Rows(fetch_all(&mut *conn, &query).await?),
            BatchOp::Execute(query) => BatchResult::Affected(execute(&mut *conn, &query).await?),
        };
        results.push(result);
    }
    Ok(results)
}
