//! The root database handle.

use std::sync::Arc;

use slate_core::query::{CompiledQuery, Compiler, Statement};
use slate_core::SchemaSnapshot;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::exec::{self, BatchOp, BatchResult};
use crate::row::Row;
use crate::transaction::Transaction;
use crate::writer::{WriterGate, WriterPermit, WriterStats};

/// A connection pool plus the single-writer gate and the declared schema.
///
/// Cheap to clone; clones share the pool, the gate and the schema.
/// Reads go straight to the pool. Every write path (`execute`, `batch`,
/// `begin`) first waits for the writer role, so writes are serialized
/// in arrival order.
///
/// A task holding a [`Transaction`] must not write through the
/// `Database` itself: the second write would queue behind the first
/// forever.
///
/// ```rust,ignore
/// let db = Database::connect(&DatabaseConfig::file("app.db"))
///     .await?
///     .with_schema(schema);
///
/// let query = db.compile(&Query::from("users").filter(col("users", "id").eq(1_i64)))?;
/// let user = db.fetch_optional(&query).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    writer: Arc<WriterGate>,
    schema: Arc<SchemaSnapshot>,
}

impl Database {
    /// Opens a pool as described by `config`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid URL or if the database cannot be opened.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await?;
        info!(url = %config.url, "database connected");
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool, with an empty declared schema.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(WriterGate::new()),
            schema: Arc::new(SchemaSnapshot::new()),
        }
    }

    /// Registers the declared schema queries compile against.
    #[must_use]
    pub fn with_schema(mut self, schema: SchemaSnapshot) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    /// The declared schema, as registered with
    /// [`with_schema`](Self::with_schema). This is the value to persist
    /// and diff against on the next start.
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

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for the writer role. Used by callers that write through
    /// their own connection, such as the migration executor.
    pub async fn acquire_writer(&self) -> WriterPermit {
        self.writer.acquire().await
    }

    /// Writer wait statistics.
    #[must_use]
    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    /// Clears the writer wait statistics.
    pub fn reset_writer_stats(&self) {
        self.writer.reset();
    }

    /// Runs a query and decodes every row. Sees committed state only.
    ///
    /// # Errors
    ///
    /// Database errors and values that do not decode as their column type.
    pub async fn fetch_all(&self, query: &CompiledQuery) -> Result<Vec<Row>> {
        exec::fetch_all(&self.pool, query).await
    }

    /// Runs a query and decodes the first row, if any.
    ///
    /// # Errors
    ///
    /// As [`fetch_all`](Self::fetch_all).
    pub async fn fetch_optional(&self, query: &CompiledQuery) -> Result<Option<Row>> {
        exec::fetch_optional(&self.pool, query).await
    }

    /// Runs a write under the writer role and returns the affected-row
    /// count. The no-op sentinel returns 0 without touching the engine.
    ///
    /// # Errors
    ///
    /// Constraint violations are reported as
    /// [`RuntimeError::ConstraintViolation`](crate::RuntimeError::ConstraintViolation).
    pub async fn execute(&self, query: &CompiledQuery) -> Result<u64> {
        if query.is_noop() {
            return Ok(0);
        }
        let _permit = self.writer.acquire().await;
        exec::execute(&self.pool, query).await
    }

    /// Runs `ops` in order as one atomic unit and returns their results
    /// in the same order. Either every op takes effect or none does. An
    /// empty batch returns an empty vec.
    ///
    /// # Errors
    ///
    /// The first failing op's error, after the batch is rolled back.
    pub async fn batch(&self, ops: Vec<BatchOp>) -> Result<Vec<BatchResult>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let _permit = self.writer.acquire().await;
        let count = ops.len();
        let mut tx = self.pool.begin().await?;
        match exec::run_batch(&mut tx, ops).await {
            Ok(results) => {
                tx.commit().await?;
                debug!(ops = count, "batch committed");
                Ok(results)
            }
            Err(err) => {
                warn!(ops = count, error = %err, "batch failed, rolling back");
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    /// Waits for the writer role and opens a transaction holding it.
    ///
    /// # Errors
    ///
    /// Fails if no connection can be acquired or `BEGIN` fails.
    pub async fn begin(&self) -> Result<Transaction> {
        let permit = self.writer.acquire().await;
        let tx = self.pool.begin().await?;
        debug!(waited = ?permit.waited(), "transaction started");
        Ok(Transaction::new(tx, Arc::clone(&self.schema), permit))
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
