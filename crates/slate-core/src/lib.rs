//! # slate-core
//!
//! The pure, I/O-free half of slate, an embedded SQLite toolkit.
//!
//! This crate provides:
//! - A typed value codec between Rust values and SQLite storage classes
//! - A declarative schema model with validated, serializable snapshots
//! - A query compiler that resolves every column against the schema and
//!   renders parameterized SQL, including joins, subqueries and CTEs,
//!   aggregates, window functions and FTS5 full-text search
//! - A schema differ that plans migrations around SQLite's `ALTER TABLE`
//!   limits, plus an analyzer for raw migration SQL
//!
//! ## Compiling a query
//!
//! ```rust
//! use slate_core::ast::{col, window::{count, sum}, ExprOps};
//! use slate_core::query::{Compiler, Query};
//! use slate_core::schema::{integer, real, text, SchemaSnapshot, TableDescriptor};
//!
//! let schema = SchemaSnapshot::from_tables(vec![TableDescriptor::new("orders")
//!     .column(integer("id").primary_key())
//!     .column(text("customer"))
//!     .column(real("amount"))])
//! .unwrap();
//!
//! let query = Query::from("orders")
//!     .select("customer", col("orders", "customer"))
//!     .select("total", sum(col("orders", "amount")))
//!     .group_by(col("orders", "customer"))
//!     .filter(count(col("orders", "id")).gt(2_i64));
//!
//! let compiled = Compiler::new(&schema).compile(&query).unwrap();
//! assert_eq!(
//!     compiled.sql,
//!     "SELECT \"orders\".\"customer\" AS \"customer\", sum(\"orders\".\"amount\") AS \"total\" \
//!      FROM \"orders\" GROUP BY \"orders\".\"customer\" HAVING count(\"orders\".\"id\") > ?"
//! );
//! ```
//!
//! ## Values are always bound
//!
//! Literals never appear in the SQL text:
//!
//! ```rust
//! use slate_core::ast::{col, ExprOps};
//! use slate_core::query::{Compiler, Query};
//! use slate_core::schema::{integer, text, SchemaSnapshot, TableDescriptor};
//! use slate_core::SqlValue;
//!
//! let schema = SchemaSnapshot::from_tables(vec![TableDescriptor::new("users")
//!     .column(integer("id").primary_key())
//!     .column(text("name"))])
//! .unwrap();
//!
//! let user_input = "'; DROP TABLE users; --";
//! let compiled = Compiler::new(&schema)
//!     .compile(&Query::from("users").select("id", col("users", "id")).filter(col("users", "name").eq(user_input)))
//!     .unwrap();
//! assert!(compiled.sql.ends_with("WHERE \"users\".\"name\" = ?"));
//! assert_eq!(compiled.binds, vec![SqlValue::Text(user_input.to_string())]);
//! ```

pub mod ast;
pub mod dialect;
pub mod error;
pub mod fts;
pub mod migrations;
pub mod query;
pub mod schema;
pub mod value;

pub use error::{CompileError, DecodeError, SchemaError};
pub use fts::{FtsSearch, MatchQuery};
pub use migrations::{analyze_migration, diff, MigrationAnalysis, MigrationScript};
pub use query::{CompiledQuery, Compiler, Query, ResultColumn, Statement};
pub use schema::{SchemaSnapshot, Table, TableDescriptor};
pub use value::{FromValue, SqlValue, ToValue, Value};

/// Commonly used items, for glob import.
pub mod prelude {
    pub use crate::ast::functions::{call, cast};
    pub use crate::ast::window::*;
    pub use crate::ast::{alias, case, col, exists, lit, matches, not_exists, scalar, ExprOps, IntoExpr};
    pub use crate::fts::{FtsSearch, MatchQuery};
    pub use crate::query::{Compiler, Delete, Insert, Join, JoinKind, Query, Update};
    pub use crate::schema::{
        blob, boolean, datetime, integer, json, real, text, ColumnType, DefaultValue,
        IndexDescriptor, SchemaSnapshot, Table, TableDescriptor,
    };
    pub use crate::value::{FromValue, ToValue, Value};
}
