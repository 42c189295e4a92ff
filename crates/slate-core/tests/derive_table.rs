//! Tests for the `#[derive(Table)]` macro output.
//!
//! These tests verify that the derive macro generates:
//! - a `{Struct}Table` struct implementing the `Table` trait
//! - a descriptor matching the builder-function equivalent
//! - column accessors usable in compiled queries

use chrono::{DateTime, Utc};
use slate_core::ast::{col, ExprOps};
use slate_core::migrations::{diff, MigrationOp};
use slate_core::query::{Compiler, Query};
use slate_core::schema::{
    boolean, datetime, integer, json, text, ColumnType, DefaultValue, FtsOptions,
    IndexDescriptor, OnDelete, SchemaSnapshot, Table, TableDescriptor,
};
use slate_derive::Table;

// =============================================================================
// Basic struct with default table name (snake_case)
// =============================================================================

#[allow(dead_code)]
#[derive(Debug, Clone, Table)]
pub struct BlogUser {
    #[column(primary_key, autoincrement)]
    pub id: i64,
    #[column(unique)]
    pub email: String,
    pub display_name: Option<String>,
    #[column(default = true)]
    pub active: bool,
    #[column(default_now)]
    pub created_at: DateTime<Utc>,
    #[column(type = "json", nullable)]
    pub settings: Option<serde_json::Value>,
}

#[test]
fn test_table_metadata() {
    assert_eq!(BlogUserTable::NAME, "blog_user");
    assert_eq!(BlogUserTable::table_name(), "blog_user");
    assert_eq!(
        BlogUserTable::COLUMNS,
        &["id", "email", "display_name", "active", "created_at", "settings"]
    );
    assert_eq!(BlogUserTable::PRIMARY_KEY, Some("id"));
}

#[test]
fn test_descriptor_matches_builder() {
    let expected = TableDescriptor::new("blog_user")
        .column(integer("id").primary_key().autoincrement())
        .column(text("email").unique())
        .column(text("display_name").nullable())
        .column(boolean("active").default(DefaultValue::Boolean(true)))
        .column(datetime("created_at").default_now())
        .column(json("settings").nullable());
    assert_eq!(BlogUserTable::descriptor(), expected);
}

#[test]
fn test_column_accessors() {
    let email = BlogUserTable::email();
    assert_eq!(email, col("blog_user", "email"));
}

// =============================================================================
// Custom names, foreign keys and indexes
// =============================================================================

#[allow(dead_code)]
#[derive(Debug, Clone, Table)]
#[table(name = "posts")]
#[index(name = "idx_posts_title", columns = "title, score", unique)]
pub struct Post {
    #[column(primary_key)]
    pub id: i64,
    #[column(name = "author_id", references = "blog_user.id", cascade)]
    pub author: i64,
    pub title: String,
    #[column(default = -1, check = "score >= -1")]
    pub score: i32,
    pub body: Option<Vec<u8>>,
    pub rating: f64,
}

#[test]
fn test_custom_names_and_constraints() {
    assert_eq!(PostTable::NAME, "posts");
    assert_eq!(PostTable::author(), col("posts", "author_id"));

    let descriptor = PostTable::descriptor();
    let author = descriptor.column_named("author_id").unwrap();
    let fk = author.references.as_ref().unwrap();
    assert_eq!((fk.table.as_str(), fk.column.as_str()), ("blog_user", "id"));
    assert_eq!(fk.on_delete, OnDelete::Cascade);

    let score = descriptor.column_named("score").unwrap();
    assert_eq!(score.default, Some(DefaultValue::Integer(-1)));
    assert_eq!(score.check.as_deref(), Some("score >= -1"));

    assert_eq!(descriptor.column_named("body").unwrap().ty, ColumnType::Blob);
    assert!(descriptor.column_named("body").unwrap().nullable);
    assert_eq!(descriptor.column_named("rating").unwrap().ty, ColumnType::Real);
    assert_eq!(
        descriptor.indexes,
        vec![IndexDescriptor::new("idx_posts_title", &["title", "score"]).unique()]
    );
}

// =============================================================================
// Full-text tables
// =============================================================================

#[allow(dead_code)]
#[derive(Debug, Clone, Table)]
#[table(name = "articles", fts, tokenizer = "porter unicode61")]
pub struct Article {
    pub title: String,
    pub body: String,
}

#[test]
fn test_full_text_descriptor() {
    let descriptor = ArticleTable::descriptor();
    assert_eq!(
        descriptor.fts,
        Some(FtsOptions {
            tokenizer: Some("porter unicode61".into())
        })
    );
    assert_eq!(ArticleTable::PRIMARY_KEY, None);
}

// =============================================================================
// Derived tables in snapshots, queries and migrations
// =============================================================================

#[test]
fn test_derived_tables_compose_into_schema() {
    let schema = SchemaSnapshot::new()
        .with::<BlogUserTable>()
        .unwrap()
        .with::<PostTable>()
        .unwrap();

    let query = Query::from("posts")
        .select("title", PostTable::title())
        .select("email", BlogUserTable::email())
        .join(slate_core::query::Join::inner(
            PostTable::author(),
            BlogUserTable::id(),
        ))
        .filter(PostTable::score().gt(0_i64));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"posts\".\"title\" AS \"title\", \"blog_user\".\"email\" AS \"email\" \
         FROM \"posts\" INNER JOIN \"blog_user\" ON \"posts\".\"author_id\" = \"blog_user\".\"id\" \
         WHERE \"posts\".\"score\" > ?"
    );

    let script = diff(&schema, None);
    let created: Vec<&str> = script
        .ops
        .iter()
        .filter_map(|op| match op {
            MigrationOp::CreateTable(t) => Some(t.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec!["blog_user", "posts"]);
}
