//! Schema diffing and migration SQL.
//!
//! [`diff`] compares two [`SchemaSnapshot`](crate::schema::SchemaSnapshot)s
//! and returns a [`MigrationScript`]; [`SqliteDialect`] renders its
//! operations; [`analyze_migration`] classifies SQL text, generated or
//! hand-written.
//!
//! ```rust
//! use slate_core::migrations::{diff, MigrationOp};
//! use slate_core::schema::{integer, text, SchemaSnapshot, TableDescriptor};
//!
//! let v1 = SchemaSnapshot::from_tables(vec![
//!     TableDescriptor::new("users").column(integer("id").primary_key()),
//! ])
//! .unwrap();
//! let v2 = SchemaSnapshot::from_tables(vec![TableDescriptor::new("users")
//!     .column(integer("id").primary_key())
//!     .column(text("bio").nullable())])
//! .unwrap();
//!
//! let script = diff(&v2, Some(&v1));
//! assert!(matches!(&script.ops[..], [MigrationOp::AddColumn { .. }]));
//! assert!(!script.is_destructive());
//! assert_eq!(script.to_sql(), "ALTER TABLE \"users\" ADD COLUMN \"bio\" TEXT;\n");
//! ```

mod analyze;
mod ddl;
mod diff;
mod operation;
mod script;

pub use analyze::{analyze_migration, split_statements, MigrationAnalysis, TableColumn};
pub use ddl::{SqliteDialect, TEMP_PREFIX};
pub use diff::{diff, DiffWarning};
pub use operation::{CopyColumn, MigrationOp, RecreateReason};
pub use script::MigrationScript;
