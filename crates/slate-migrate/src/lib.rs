//! Atomic schema migrations for slate databases.
//!
//! Scripts come from the differ in `slate-core` or from hand-written
//! SQL. Either way they run through [`Migrator`]:
//!
//! - one transaction per script, on a dedicated connection holding the
//!   database's writer role
//! - `PRAGMA foreign_key_check` before commit
//! - dry runs that execute everything and then roll back
//!
//! [`Migrator::sync`] additionally keeps a schema history table, so an
//! application can diff its declared schema against the last one it
//! migrated to on every start.
//!
//! # Example
//!
//! ```rust,ignore
//! use slate_migrate::{Migrator, SyncOptions};
//! use slate_runtime::{Database, DatabaseConfig};
//!
//! let db = Database::connect(&DatabaseConfig::file("app.db")).await?.with_schema(schema);
//! let report = Migrator::new(db.clone())
//!     .sync(db.schema(), SyncOptions::default())
//!     .await?;
//! for warning in report.warnings() {
//!     eprintln!("{warning}");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the SQL that turns old.json into new.json
//! slate-migrate diff --current new.json --previous old.json
//!
//! # Classify a script
//! slate-migrate analyze migration.sql
//!
//! # Validate, then apply
//! slate-migrate migrate migration.sql --dry-run
//! slate-migrate migrate migration.sql
//!
//! # Bring a database up to a schema snapshot
//! slate-migrate sync --schema schema.json --allow-destructive
//! ```

pub mod error;
pub mod executor;
pub mod history;

pub use error::{MigrateError, Result};
pub use executor::{ApplyOptions, ApplyReport, Migrator, SyncOptions, SyncReport};
pub use history::{HistoryEntry, SchemaHistory};
