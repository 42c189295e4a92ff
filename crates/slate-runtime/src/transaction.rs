//! Explicit transactions.

use std::sync::Arc;

use slate_core::query::{CompiledQuery, Compiler, Statement};
use slate_core::SchemaSnapshot;
use sqlx::{Connection, Sqlite};
use tracing::{info, warn};

use crate::error::Result;
use crate::exec::{self, BatchOp, BatchResult};
use crate::row::Row;
use crate::writer::WriterPermit;

/// An open transaction holding the writer role.
///
/// Exposes the same query surface as [`Database`](crate::Database).
/// Resolve it with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback); dropping it unresolved rolls back.
#[derive(Debug)]
pub struct Transaction {
    // declared first: drops, queueing its rollback, before the permit
    tx: sqlx::Transaction<'static, Sqlite>,
    schema: Arc<SchemaSnapshot>,
    _permit: WriterPermit,
}

impl Transaction {
    pub(crate) const fn new(
        tx: sqlx::Transaction<'static, Sqlite>,
        schema: Arc<SchemaSnapshot>,
        permit: WriterPermit,
    ) -> Self {
        Self {
            tx,
            schema,
            _permit: permit,
        }
    }

    /// The declared schema.
    #[must_use]
    pub fn schema(&self) -> &SchemaSnapshot {
        &self.schema
    }

    /// A compiler over the declared schema.
    #[must_use]
    pub fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.schema)
    }

    /// Compiles a statement against the declared schema.
    ///
    /// # Errors
    ///
    /// Any [`CompileError`](slate_core::CompileError), before I/O.
    pub fn compile<S: Statement + ?Sized>(&self, statement: &S) -> Result<CompiledQuery> {
        Ok(self.compiler().compile(statement)?)
    }

    /// Runs a query and decodes every row. Sees this transaction's own
    /// uncommitted writes.
    ///
    /// # Errors
    ///
    /// Database errors and values that do not decode as their column type.
    pub async fn fetch_all(&mut self, query: &CompiledQuery) -> Result<Vec<Row>> {
        exec::fetch_all(&mut *self.tx, query).await
    }

    /// Runs a query and decodes the first row, if any.
    ///
    /// # Errors
    ///
    /// As [`fetch_all`](Self::fetch_all).
    pub async fn fetch_optional(&mut self, query: &CompiledQuery) -> Result<Option<Row>> {
        exec::fetch_optional(&mut *self.tx, query).await
    }

    /// Runs a statement and returns the affected-row count.
    ///
    /// # Errors
    ///
    /// Constraint violations are reported as
    /// [`RuntimeError::ConstraintViolation`](crate::RuntimeError::ConstraintViolation).
    /// The transaction stays open.
    pub async fn execute(&mut self, query: &CompiledQuery) -> Result<u64> {
        exec::execute(&mut *self.tx, query).await
    }

    /// Runs `ops` in order inside a savepoint. A failing op rolls back
    /// the whole batch but leaves the transaction open.
    ///
    /// # Errors
    ///
    /// The first failing op's error, after the savepoint is rolled back.
    pub async fn batch(&mut self, ops: Vec<BatchOp>) -> Result<Vec<BatchResult>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let mut savepoint = (*self.tx).begin().await?;
        match exec::run_batch(&mut savepoint, ops).await {
            Ok(results) => {
                savepoint.commit().await?;
                Ok(results)
            }
            Err(err) => {
                warn!(error = %err, "batch failed, rolling back to savepoint");
                savepoint.rollback().await?;
                Err(err)
            }
        }
    }

    /// Commits and releases the writer role.
    ///
    /// # Errors
    ///
    /// Fails if `COMMIT` fails; the writer role is released either way.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        info!("transaction committed");
        Ok(())
    }

    /// Rolls back and releases the writer role.
    ///
    /// # Errors
    ///
    /// Fails if `ROLLBACK` fails; the writer role is released either way.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        info!("transaction rolled back");
        Ok(())
    }
}
