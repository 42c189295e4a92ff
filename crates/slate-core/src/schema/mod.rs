//! Declarative schema model.
//!
//! Tables are plain data: a [`TableDescriptor`] holds ordered
//! [`ColumnDescriptor`]s, [`IndexDescriptor`]s and optional full-text
//! options. A [`SchemaSnapshot`] is a validated, immutable set of tables
//! that can be persisted as JSON and diffed against its successor.
//!
//! ```rust
//! use slate_core::schema::{integer, text, SchemaSnapshot, TableDescriptor};
//!
//! let users = TableDescriptor::new("users")
//!     .column(integer("id").primary_key().autoincrement())
//!     .column(text("name"))
//!     .column(text("bio").nullable());
//! let schema = SchemaSnapshot::from_tables(vec![users]).unwrap();
//! assert_eq!(schema.len(), 1);
//! ```

mod column;
mod snapshot;
mod table;

pub use column::{
    blob, boolean, datetime, integer, json, real, text, ColumnDescriptor, ColumnType,
    DefaultValue, ForeignKeyRef, OnDelete,
};
pub use snapshot::SchemaSnapshot;
pub use table::{FtsOptions, IndexDescriptor, Table, TableDescriptor};
