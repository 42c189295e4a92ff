//! # slate-runtime
//!
//! Executes statements compiled by `slate-core` against SQLite through
//! `sqlx`, under a single-writer, many-reader discipline.
//!
//! - [`Database`]: pooled reads, gated writes, atomic batches
//! - [`Transaction`]: the same query surface inside one transaction
//! - [`WriterGate`]: FIFO writer role with wait statistics
//! - [`Row`]: rows decoded through the compiled result-column types
//!
//! Constraint failures reported by the engine surface unchanged as
//! [`RuntimeError::ConstraintViolation`]; nothing is retried.
//!
//! ```rust,ignore
//! use slate_runtime::{BatchOp, Database, DatabaseConfig};
//!
//! let db = Database::connect(&DatabaseConfig::file("app.db")).await?.with_schema(schema);
//! let results = db
//!     .batch(vec![
//!         BatchOp::from(db.compile(&Insert::into("users").value("name", "alice"))?),
//!         BatchOp::from(db.compile(&Query::from("users"))?),
//!     ])
//!     .await?;
//! ```

mod config;
mod database;
mod error;
mod exec;
mod row;
mod transaction;
mod writer;

pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{ConstraintKind, Result, RuntimeError};
pub use exec::{BatchOp, BatchResult};
pub use row::Row;
pub use transaction::Transaction;
pub use writer::{WriterGate, WriterPermit, WriterStats};
