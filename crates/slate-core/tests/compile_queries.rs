//! Integration tests for query compilation.
//!
//! Every test compiles against the same small schema and asserts the
//! exact SQL text and bind order, or the exact compile error.

use slate_core::ast::functions::{call, call_named, lower, ScalarFn};
use slate_core::ast::window::{avg, count, count_all, dense_rank, rank, row_number, sum};
use slate_core::ast::{alias, case, col, exists, matches, ExprOps, Frame, FrameBound, WindowSpec};
use slate_core::error::CompileError;
use slate_core::fts::MatchQuery;
use slate_core::query::{Compiler, Join, Query};
use slate_core::schema::{
    datetime, integer, real, text, ColumnType, FtsOptions, SchemaSnapshot, TableDescriptor,
};
use slate_core::SqlValue;

fn schema() -> SchemaSnapshot {
    SchemaSnapshot::from_tables(vec![
        TableDescriptor::new("users")
            .column(integer("id").primary_key())
            .column(text("name"))
            .column(integer("manager_id").nullable().references("users", "id"))
            .column(integer("age").nullable()),
        TableDescriptor::new("orders")
            .column(integer("id").primary_key())
            .column(integer("user_id").references("users", "id"))
            .column(real("amount"))
            .column(datetime("placed_at")),
        TableDescriptor::new("docs")
            .column(text("title"))
            .column(text("body"))
            .full_text(FtsOptions::default()),
    ])
    .unwrap()
}

// =============================================================================
// Projection and filters
// =============================================================================

#[test]
fn test_empty_select_projects_every_column() {
    let schema = schema();
    let compiled = Compiler::new(&schema).compile(&Query::from("users")).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"users\".\"id\" AS \"id\", \"users\".\"name\" AS \"name\", \
         \"users\".\"manager_id\" AS \"manager_id\", \"users\".\"age\" AS \"age\" FROM \"users\""
    );
    let types: Vec<ColumnType> = compiled.result_columns.iter().map(|c| c.ty).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Integer,
            ColumnType::Text,
            ColumnType::Integer,
            ColumnType::Integer
        ]
    );
}

#[test]
fn test_or_conjunct_is_parenthesized() {
    let schema = schema();
    let query = Query::from("users")
        .select("id", col("users", "id"))
        .filter(col("users", "age").eq(30_i64).or(col("users", "name").eq("bob")))
        .filter(col("users", "id").gt(1_i64));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"users\".\"id\" AS \"id\" FROM \"users\" \
         WHERE (\"users\".\"age\" = ? OR \"users\".\"name\" = ?) AND \"users\".\"id\" > ?"
    );
    assert_eq!(
        compiled.binds,
        vec![
            SqlValue::Int(30),
            SqlValue::Text("bob".into()),
            SqlValue::Int(1)
        ]
    );
}

#[test]
fn test_arithmetic_precedence() {
    let schema = schema();
    let query = Query::from("users").select("x", col("users", "age").add(1_i64).mul(2_i64));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT (\"users\".\"age\" + ?) * ? AS \"x\" FROM \"users\""
    );
    assert_eq!(compiled.result_columns[0].ty, ColumnType::Integer);
}

#[test]
fn test_case_and_functions() {
    let schema = schema();
    let query = Query::from("users")
        .select("bucket", case().when(col("users", "age").lt(18_i64), "minor").otherwise("adult"))
        .select("lname", lower(col("users", "name")));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT CASE WHEN \"users\".\"age\" < ? THEN ? ELSE ? END AS \"bucket\", \
         lower(\"users\".\"name\") AS \"lname\" FROM \"users\""
    );
    assert_eq!(compiled.result_columns[0].ty, ColumnType::Text);
}

#[test]
fn test_null_comparison_binds_null() {
    let schema = schema();
    let query = Query::from("users")
        .select("id", col("users", "id"))
        .filter(col("users", "manager_id").is(None::<i64>));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert!(compiled.sql.ends_with("WHERE \"users\".\"manager_id\" IS ?"));
    assert_eq!(compiled.binds, vec![SqlValue::Null]);
}

#[test]
fn test_limit_and_offset_are_bound() {
    let schema = schema();
    let compiler = Compiler::new(&schema);

    let limited = compiler
        .compile(&Query::from("users").select("id", col("users", "id")).limit(5))
        .unwrap();
    assert!(limited.sql.ends_with(" LIMIT ?"));
    assert_eq!(limited.binds, vec![SqlValue::Int(5)]);

    let offset_only = compiler
        .compile(&Query::from("users").select("id", col("users", "id")).offset(10))
        .unwrap();
    assert!(offset_only.sql.ends_with(" LIMIT ? OFFSET ?"));
    assert_eq!(offset_only.binds, vec![SqlValue::Int(-1), SqlValue::Int(10)]);
}

// =============================================================================
// Joins
// =============================================================================

#[test]
fn test_inner_and_left_joins() {
    let schema = schema();
    let compiler = Compiler::new(&schema);
    let base = || {
        Query::from("users")
            .select("name", col("users", "name"))
            .select("amount", col("orders", "amount"))
    };

    let inner = compiler
        .compile(&base().join(Join::inner(col("users", "id"), col("orders", "user_id"))))
        .unwrap();
    assert_eq!(
        inner.sql,
        "SELECT \"users\".\"name\" AS \"name\", \"orders\".\"amount\" AS \"amount\" \
         FROM \"users\" INNER JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\""
    );
    assert_eq!(inner.result_columns[1].ty, ColumnType::Real);

    let left = compiler
        .compile(&base().join(Join::left(col("orders", "user_id"), col("users", "id"))))
        .unwrap();
    assert!(left
        .sql
        .contains("LEFT JOIN \"orders\" ON \"orders\".\"user_id\" = \"users\".\"id\""));
}

#[test]
fn test_self_join_through_alias() {
    let schema = schema();
    let query = Query::from("users")
        .select("employee", col("users", "name"))
        .select("manager", col("boss", "name"))
        .join(Join::left(col("users", "manager_id"), col("boss", "id")).aliasing("users"));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"users\".\"name\" AS \"employee\", \"boss\".\"name\" AS \"manager\" \
         FROM \"users\" LEFT JOIN \"users\" AS \"boss\" ON \"users\".\"manager_id\" = \"boss\".\"id\""
    );
}

#[test]
fn test_aliased_from() {
    let schema = schema();
    let compiled = Compiler::new(&schema)
        .compile(&Query::from_aliased("users", "u").select("n", col("u", "name")))
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"u\".\"name\" AS \"n\" FROM \"users\" AS \"u\""
    );
}

#[test]
fn test_join_errors() {
    let schema = schema();
    let compiler = Compiler::new(&schema);

    let both_in_scope = Query::from("users")
        .select("id", col("users", "id"))
        .join(Join::inner(col("users", "id"), col("users", "manager_id")));
    assert!(matches!(
        compiler.compile(&both_in_scope),
        Err(CompileError::InvalidJoin(_))
    ));

    let unknown_table = Query::from("users")
        .select("id", col("users", "id"))
        .join(Join::inner(col("users", "id"), col("invoices", "user_id")));
    assert_eq!(
        compiler.compile(&unknown_table),
        Err(CompileError::UnknownTable("invoices".into()))
    );
}

// =============================================================================
// Aggregates and HAVING routing
// =============================================================================

#[test]
fn test_aggregate_filters_route_to_having() {
    let schema = schema();
    let query = Query::from("orders")
        .select("user_id", col("orders", "user_id"))
        .select("n", count_all())
        .group_by(col("orders", "user_id"))
        .filter(col("orders", "amount").gt(10.0).and(count_all().gt(1_i64)));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"orders\".\"user_id\" AS \"user_id\", count(*) AS \"n\" FROM \"orders\" \
         WHERE \"orders\".\"amount\" > ? GROUP BY \"orders\".\"user_id\" HAVING count(*) > ?"
    );
    assert_eq!(compiled.binds, vec![SqlValue::Float(10.0), SqlValue::Int(1)]);
    assert_eq!(compiled.result_columns[1].ty, ColumnType::Integer);
}

#[test]
fn test_output_alias_in_having_and_order_by() {
    let schema = schema();
    let query = Query::from("orders")
        .select("user_id", col("orders", "user_id"))
        .select("total", sum(col("orders", "amount")))
        .group_by(col("orders", "user_id"))
        .filter(alias("total").gt(100.0))
        .order_by_desc(alias("total"));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"orders\".\"user_id\" AS \"user_id\", sum(\"orders\".\"amount\") AS \"total\" \
         FROM \"orders\" GROUP BY \"orders\".\"user_id\" HAVING sum(\"orders\".\"amount\") > ? \
         ORDER BY \"total\" DESC"
    );
    assert_eq!(compiled.result_columns[1].ty, ColumnType::Real);
}

#[test]
fn test_distinct_count() {
    let schema = schema();
    let query = Query::from("orders").select("buyers", count(col("orders", "user_id")).distinct());
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT count(DISTINCT \"orders\".\"user_id\") AS \"buyers\" FROM \"orders\""
    );
}

// =============================================================================
// Window functions
// =============================================================================

#[test]
fn test_ranking_window_has_no_frame() {
    let schema = schema();
    let window = WindowSpec::new()
        .partition_by(col("orders", "user_id"))
        .order_by_desc(col("orders", "amount"));
    let query = Query::from("orders")
        .select("id", col("orders", "id"))
        .select("rank", rank().over(window.clone()))
        .select("dense", dense_rank().over(window));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"orders\".\"id\" AS \"id\", \
         rank() OVER (PARTITION BY \"orders\".\"user_id\" ORDER BY \"orders\".\"amount\" DESC) AS \"rank\", \
         dense_rank() OVER (PARTITION BY \"orders\".\"user_id\" ORDER BY \"orders\".\"amount\" DESC) AS \"dense\" \
         FROM \"orders\""
    );
}

#[test]
fn test_aggregate_window_gets_default_frame() {
    let schema = schema();
    let query = Query::from("orders").select(
        "running",
        sum(col("orders", "amount")).over(WindowSpec::new().order_by(col("orders", "placed_at"))),
    );
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT sum(\"orders\".\"amount\") OVER (ORDER BY \"orders\".\"placed_at\" \
         RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) AS \"running\" FROM \"orders\""
    );
    assert!(compiled.binds.is_empty());
}

#[test]
fn test_rows_frame_offsets_are_bound() {
    let schema = schema();
    let window = WindowSpec::new()
        .order_by(col("orders", "placed_at"))
        .frame(Frame::rows(FrameBound::Preceding(2), FrameBound::Following(1)));
    let query = Query::from("orders").select("moving", avg(col("orders", "amount")).over(window));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT avg(\"orders\".\"amount\") OVER (ORDER BY \"orders\".\"placed_at\" \
         ROWS BETWEEN ? PRECEDING AND ? FOLLOWING) AS \"moving\" FROM \"orders\""
    );
    assert_eq!(compiled.binds, vec![SqlValue::Int(2), SqlValue::Int(1)]);
}

#[test]
fn test_invalid_frames() {
    let schema = schema();
    let compiler = Compiler::new(&schema);
    let with_frame = |order: &str, frame: Frame| {
        Query::from("orders").select(
            "x",
            sum(col("orders", "amount"))
                .over(WindowSpec::new().order_by(col("orders", order)).frame(frame)),
        )
    };

    let reversed = with_frame("id", Frame::rows(FrameBound::CurrentRow, FrameBound::Preceding(1)));
    assert!(matches!(
        compiler.compile(&reversed),
        Err(CompileError::InvalidFrame(_))
    ));

    let shrinking_preceding = with_frame(
        "id",
        Frame::rows(FrameBound::Preceding(1), FrameBound::Preceding(3)),
    );
    assert!(matches!(
        compiler.compile(&shrinking_preceding),
        Err(CompileError::InvalidFrame(_))
    ));

    let shrinking_following = with_frame(
        "id",
        Frame::rows(FrameBound::Following(5), FrameBound::Following(2)),
    );
    assert!(matches!(
        compiler.compile(&shrinking_following),
        Err(CompileError::InvalidFrame(_))
    ));

    let trailing_window = with_frame(
        "id",
        Frame::rows(FrameBound::Preceding(3), FrameBound::Preceding(1)),
    );
    assert!(compiler
        .compile(&trailing_window)
        .unwrap()
        .sql
        .contains("ROWS BETWEEN ? PRECEDING AND ? PRECEDING"));

    let range_over_datetime = with_frame(
        "placed_at",
        Frame::range(FrameBound::Preceding(3), FrameBound::CurrentRow),
    );
    assert!(matches!(
        compiler.compile(&range_over_datetime),
        Err(CompileError::InvalidFrame(_))
    ));

    let range_over_number = with_frame(
        "amount",
        Frame::range(FrameBound::Preceding(3), FrameBound::CurrentRow),
    );
    assert!(compiler.compile(&range_over_number).is_ok());
}

#[test]
fn test_window_placement_errors() {
    let schema = schema();
    let compiler = Compiler::new(&schema);

    let bare_rank = Query::from("orders").select("r", rank());
    assert_eq!(
        compiler.compile(&bare_rank),
        Err(CompileError::WindowRequired("rank".into()))
    );

    let window_in_filter = Query::from("orders")
        .select("id", col("orders", "id"))
        .filter(row_number().over(WindowSpec::new()).gt(1_i64));
    assert!(matches!(
        compiler.compile(&window_in_filter),
        Err(CompileError::MisplacedAggregate(_))
    ));

    let aggregate_in_group_by = Query::from("orders")
        .select("n", count_all())
        .group_by(sum(col("orders", "amount")));
    assert!(matches!(
        compiler.compile(&aggregate_in_group_by),
        Err(CompileError::MisplacedAggregate(_))
    ));
}

// =============================================================================
// Subqueries and CTEs
// =============================================================================

fn big_spenders(compiler: &mut Compiler<'_>) -> slate_core::ast::SubqueryRef {
    compiler
        .register(
            "big",
            Query::from("orders")
                .select("user_id", col("orders", "user_id"))
                .filter(col("orders", "amount").gt(100.0)),
        )
        .unwrap()
}

#[test]
fn test_single_use_subquery_stays_inline() {
    let schema = schema();
    let mut compiler = Compiler::new(&schema);
    let big = big_spenders(&mut compiler);
    let query = Query::from("users")
        .select("name", col("users", "name"))
        .filter(col("users", "id").in_subquery(&big));
    let compiled = compiler.compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"users\".\"name\" AS \"name\" FROM \"users\" WHERE \"users\".\"id\" IN \
         (SELECT \"orders\".\"user_id\" AS \"user_id\" FROM \"orders\" WHERE \"orders\".\"amount\" > ?)"
    );
    assert_eq!(compiled.binds, vec![SqlValue::Float(100.0)]);
}

#[test]
fn test_shared_subquery_becomes_cte() {
    let schema = schema();
    let mut compiler = Compiler::new(&schema);
    let big = big_spenders(&mut compiler);
    let query = Query::from("users")
        .select("name", col("users", "name"))
        .filter(col("users", "id").in_subquery(&big))
        .filter(exists(&big));
    let compiled = compiler.compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "WITH \"big\" AS (SELECT \"orders\".\"user_id\" AS \"user_id\" FROM \"orders\" \
         WHERE \"orders\".\"amount\" > ?) \
         SELECT \"users\".\"name\" AS \"name\" FROM \"users\" \
         WHERE \"users\".\"id\" IN (SELECT * FROM \"big\") AND EXISTS (SELECT * FROM \"big\")"
    );
    assert_eq!(compiled.binds, vec![SqlValue::Float(100.0)]);
}

#[test]
fn test_select_from_subquery() {
    let schema = schema();
    let mut compiler = Compiler::new(&schema);
    let big = big_spenders(&mut compiler);
    let compiled = compiler
        .compile(&Query::from_subquery(&big).select("u", big.col("user_id")))
        .unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"big\".\"user_id\" AS \"u\" FROM (SELECT \"orders\".\"user_id\" AS \"user_id\" \
         FROM \"orders\" WHERE \"orders\".\"amount\" > ?) AS \"big\""
    );
    assert_eq!(compiled.result_columns[0].ty, ColumnType::Integer);
}

#[test]
fn test_subquery_alias_cannot_shadow_table() {
    let schema = schema();
    let mut compiler = Compiler::new(&schema);
    let result = compiler.register("users", Query::from("orders"));
    assert!(matches!(result, Err(CompileError::InvalidSubquery(_))));
}

// =============================================================================
// Full-text search
// =============================================================================

#[test]
fn test_match_pattern_is_bound() {
    let schema = schema();
    let query = Query::from("docs").select("title", col("docs", "title")).filter(matches(
        "docs",
        MatchQuery::and(vec![MatchQuery::term("rust"), MatchQuery::term("async")]),
    ));
    let compiled = Compiler::new(&schema).compile(&query).unwrap();
    assert_eq!(
        compiled.sql,
        "SELECT \"docs\".\"title\" AS \"title\" FROM \"docs\" WHERE \"docs\" MATCH ?"
    );
    assert_eq!(
        compiled.binds,
        vec![SqlValue::Text("\"rust\" AND \"async\"".into())]
    );
}

#[test]
fn test_match_requires_full_text_table() {
    let schema = schema();
    let query = Query::from("users")
        .select("id", col("users", "id"))
        .filter(matches("users", MatchQuery::term("x")));
    assert_eq!(
        Compiler::new(&schema).compile(&query),
        Err(CompileError::NotFullText("users".into()))
    );
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unresolved_column() {
    let schema = schema();
    let query = Query::from("users").select("x", col("users", "nickname"));
    assert_eq!(
        Compiler::new(&schema).compile(&query),
        Err(CompileError::UnresolvedColumn {
            table: "users".into(),
            column: "nickname".into()
        })
    );

    let out_of_scope = Query::from("users").select("x", col("orders", "id"));
    assert!(matches!(
        Compiler::new(&schema).compile(&out_of_scope),
        Err(CompileError::UnresolvedColumn { .. })
    ));
}

#[test]
fn test_unknown_function_and_arity() {
    assert_eq!(
        call_named("frobnicate", vec![]),
        Err(CompileError::UnknownFunction("frobnicate".into()))
    );

    let schema = schema();
    let query = Query::from("users").select("x", call(ScalarFn::Lower, vec![]));
    assert!(matches!(
        Compiler::new(&schema).compile(&query),
        Err(CompileError::ArityMismatch { found: 0, .. })
    ));
}

#[test]
fn test_duplicate_output_and_unknown_alias() {
    let schema = schema();
    let compiler = Compiler::new(&schema);

    let duplicate = Query::from("users")
        .select("a", col("users", "id"))
        .select("a", col("users", "name"));
    assert_eq!(
        compiler.compile(&duplicate),
        Err(CompileError::DuplicateOutput("a".into()))
    );

    let unknown = Query::from("users")
        .select("a", col("users", "id"))
        .order_by(alias("b"));
    assert_eq!(
        compiler.compile(&unknown),
        Err(CompileError::UnknownAlias("b".into()))
    );
}

#[test]
fn test_literal_type_mismatch() {
    let schema = schema();
    let query = Query::from("users")
        .select("id", col("users", "id"))
        .filter(col("users", "age").eq("old"));
    assert_eq!(
        Compiler::new(&schema).compile(&query),
        Err(CompileError::TypeMismatch {
            column: "users.age".into(),
            expected: ColumnType::Integer,
            found: "text"
        })
    );
}

#[test]
fn test_case_without_branches() {
    let schema = schema();
    let query = Query::from("users").select("x", case().end());
    assert!(matches!(
        Compiler::new(&schema).compile(&query),
        Err(CompileError::InvalidExpression(_))
    ));
}

#[test]
fn test_compilation_is_deterministic() {
    let schema = schema();
    let query = Query::from("orders")
        .select("user_id", col("orders", "user_id"))
        .select("total", sum(col("orders", "amount")))
        .group_by(col("orders", "user_id"))
        .filter(count_all().ge(2_i64))
        .order_by(col("orders", "user_id"))
        .limit(3);
    let compiler = Compiler::new(&schema);
    assert_eq!(compiler.compile(&query), compiler.compile(&query));
}
