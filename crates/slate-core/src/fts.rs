//! Full-text search over FTS5 virtual tables.
//!
//! A [`MatchQuery`] compiles into an FTS5 query string that is always
//! bound as a parameter. Every term is double-quoted, so user input can
//! never inject FTS5 operators:
//!
//! ```rust
//! use slate_core::fts::MatchQuery;
//! use slate_core::schema::{text, FtsOptions, TableDescriptor};
//!
//! let docs = TableDescriptor::new("docs")
//!     .column(text("title"))
//!     .column(text("body"))
//!     .full_text(FtsOptions::default());
//!
//! let query = MatchQuery::and(vec![
//!     MatchQuery::term("web"),
//!     MatchQuery::not(MatchQuery::term("spam")),
//!     MatchQuery::column("title", MatchQuery::prefix("secur")),
//! ]);
//! assert_eq!(
//!     slate_core::fts::compile_match(&query, &docs).unwrap(),
//!     "(\"web\" AND title : \"secur\"*) NOT \"spam\""
//! );
//! ```

use crate::dialect::quote_identifier;
use crate::error::{CompileError, Result};
use crate::query::{CompiledQuery, Compiler, ResultColumn, Statement, Writer};
use crate::schema::{ColumnType, TableDescriptor};
use crate::value::SqlValue;

/// A full-text query.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchQuery {
    /// A single token.
    Term(String),
    /// Tokens that must appear consecutively.
    Phrase(String),
    /// All sub-queries must match. May hold [`MatchQuery::Not`] children
    /// as long as one child is positive.
    And(Vec<MatchQuery>),
    /// Any sub-query may match.
    Or(Vec<MatchQuery>),
    /// Excludes rows matching the inner query. Only valid inside `And`.
    Not(Box<MatchQuery>),
    /// Tokens starting with the prefix.
    Prefix(String),
    /// A phrase at the start of a column.
    StartsWith(String),
    /// Terms within `distance` tokens of each other.
    Near {
        /// At least two terms.
        terms: Vec<String>,
        /// Maximum number of tokens between terms.
        distance: u32,
    },
    /// Restricts each query to one column; entries are combined with AND.
    Columns(Vec<(String, MatchQuery)>),
}

impl MatchQuery {
    /// A single token.
    #[must_use]
    pub fn term(term: impl Into<String>) -> Self {
        Self::Term(term.into())
    }

    /// An exact phrase.
    #[must_use]
    pub fn phrase(phrase: impl Into<String>) -> Self {
        Self::Phrase(phrase.into())
    }

    /// Conjunction.
    #[must_use]
    pub const fn and(queries: Vec<Self>) -> Self {
        Self::And(queries)
    }

    /// Disjunction.
    #[must_use]
    pub const fn or(queries: Vec<Self>) -> Self {
        Self::Or(queries)
    }

    /// Negation, for use inside [`MatchQuery::and`].
    #[must_use]
    pub fn not(query: Self) -> Self {
        Self::Not(Box::new(query))
    }

    /// Prefix match.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Phrase at the start of a column.
    #[must_use]
    pub fn starts_with(phrase: impl Into<String>) -> Self {
        Self::StartsWith(phrase.into())
    }

    /// `NEAR(a b ..., distance)`.
    #[must_use]
    pub fn near<I, S>(terms: I, distance: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Near {
            terms: terms.into_iter().map(Into::into).collect(),
            distance,
        }
    }

    /// Restricts `query` to one column.
    #[must_use]
    pub fn column(column: impl Into<String>, query: Self) -> Self {
        Self::Columns(vec![(column.into(), query)])
    }

    fn is_negative(&self) -> bool {
        matches!(self, Self::Not(_))
    }

    /// Whether the rendered form needs parentheses inside an operator.
    fn is_compound(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.len() > 1,
            Self::Columns(entries) => entries.len() > 1,
            _ => false,
        }
    }
}

/// Compiles `query` for the FTS5 table `table`.
///
/// # Errors
///
/// [`CompileError::NotFullText`] for regular tables,
/// [`CompileError::UnresolvedColumn`] for column filters naming an
/// unknown column and [`CompileError::InvalidMatch`] for queries FTS5
/// cannot express.
pub fn compile_match(query: &MatchQuery, table: &TableDescriptor) -> Result<String> {
    if !table.is_full_text() {
        return Err(CompileError::NotFullText(table.name.clone()));
    }
    if query.is_negative() {
        return Err(CompileError::InvalidMatch(
            "NOT needs a positive sibling inside AND".into(),
        ));
    }
    let mut out = String::new();
    render(query, table, &mut out)?;
    Ok(out)
}

fn render(query: &MatchQuery, table: &TableDescriptor, out: &mut String) -> Result<()> {
    match query {
        MatchQuery::Term(term) | MatchQuery::Phrase(term) => out.push_str(&quote(term)?),
        MatchQuery::Prefix(prefix) => {
            out.push_str(&quote(prefix)?);
            out.push('*');
        }
        MatchQuery::StartsWith(phrase) => {
            out.push('^');
            out.push_str(&quote(phrase)?);
        }
        MatchQuery::Near { terms, distance } => {
            if terms.len() < 2 {
                return Err(CompileError::InvalidMatch("NEAR needs at least two terms".into()));
            }
            let quoted = terms.iter().map(|t| quote(t)).collect::<Result<Vec<_>>>()?;
            out.push_str(&format!("NEAR({}, {distance})", quoted.join(" ")));
        }
        MatchQuery::And(children) => {
            let (negative, positive): (Vec<_>, Vec<_>) =
                children.iter().partition(|c| c.is_negative());
            if positive.is_empty() {
                return Err(CompileError::InvalidMatch(if children.is_empty() {
                    "empty AND".into()
                } else {
                    "AND needs at least one positive term".into()
                }));
            }
            let wrap = positive.len() > 1 && !negative.is_empty();
            if wrap {
                out.push('(');
            }
            for (i, child) in positive.iter().enumerate() {
                if i > 0 {
                    out.push_str(" AND ");
                }
                render_operand(child, table, out)?;
            }
            if wrap {
                out.push(')');
            }
            for child in negative {
                out.push_str(" NOT ");
                if let MatchQuery::Not(inner) = child {
                    if inner.is_negative() {
                        return Err(CompileError::InvalidMatch("NOT cannot be nested".into()));
                    }
                    render_operand(inner, table, out)?;
                }
            }
        }
        MatchQuery::Or(children) => {
            if children.is_empty() {
                return Err(CompileError::InvalidMatch("empty OR".into()));
            }
            for (i, child) in children.iter().enumerate() {
                if child.is_negative() {
                    return Err(CompileError::InvalidMatch(
                        "NOT needs a positive sibling inside AND".into(),
                    ));
                }
                if i > 0 {
                    out.push_str(" OR ");
                }
                render_operand(child, table, out)?;
            }
        }
        MatchQuery::Not(_) => {
            return Err(CompileError::InvalidMatch(
                "NOT needs a positive sibling inside AND".into(),
            ))
        }
        MatchQuery::Columns(entries) => {
            if entries.is_empty() {
                return Err(CompileError::InvalidMatch("empty column filter".into()));
            }
            for (i, (column, inner)) in entries.iter().enumerate() {
                if table.column_named(column).is_none() {
                    return Err(CompileError::UnresolvedColumn {
                        table: table.name.clone(),
                        column: column.clone(),
                    });
                }
                if inner.is_negative() {
                    return Err(CompileError::InvalidMatch(
                        "a column filter cannot hold a bare NOT".into(),
                    ));
                }
                if i > 0 {
                    out.push_str(" AND ");
                }
                out.push_str(&column_name(column));
                out.push_str(" : ");
                render_operand(inner, table, out)?;
            }
        }
    }
    Ok(())
}

fn render_operand(query: &MatchQuery, table: &TableDescriptor, out: &mut String) -> Result<()> {
    if query.is_compound() {
        out.push('(');
        render(query, table, out)?;
        out.push(')');
        Ok(())
    } else {
        render(query, table, out)
    }
}

fn quote(term: &str) -> Result<String> {
    if term.trim().is_empty() {
        return Err(CompileError::InvalidMatch("empty term".into()));
    }
    Ok(format!("\"{}\"", term.replace('"', "\"\"")))
}

/// FTS5 barewords are ASCII alphanumerics, `_` and non-ASCII characters.
fn column_name(column: &str) -> String {
    let bare = column
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii());
    if bare {
        column.to_string()
    } else {
        quote_identifier(column)
    }
}

/// Result ordering of an [`FtsSearch`].
#[derive(Debug, Clone, PartialEq)]
pub enum RankOrder {
    /// Engine order.
    Unordered,
    /// FTS5's built-in `rank`, best match first.
    Rank,
    /// `bm25()` with per-column weights; unlisted columns weigh 1.0.
    Bm25(Vec<(String, f64)>),
}

/// A ranked full-text search over one FTS5 table.
#[derive(Debug, Clone, PartialEq)]
pub struct FtsSearch {
    table: String,
    query: MatchQuery,
    columns: Vec<String>,
    order: RankOrder,
    score: Option<String>,
    limit: Option<u64>,
}

impl FtsSearch {
    /// Searches `table` for `query`, returning every column.
    #[must_use]
    pub fn new(table: &str, query: MatchQuery) -> Self {
        Self {
            table: table.to_string(),
            query,
            columns: Vec::new(),
            order: RankOrder::Unordered,
            score: None,
            limit: None,
        }
    }

    /// Restricts the returned columns.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    /// Orders by `rank`.
    #[must_use]
    pub fn order_by_rank(mut self) -> Self {
        self.order = RankOrder::Rank;
        self
    }

    /// Orders by `bm25()` with the given column weights.
    #[must_use]
    pub fn order_by_bm25(mut self, weights: &[(&str, f64)]) -> Self {
        self.order = RankOrder::Bm25(weights.iter().map(|(c, w)| ((*c).to_string(), *w)).collect());
        self
    }

    /// Also returns the ranking score as a REAL column named `name`.
    #[must_use]
    pub fn with_score(mut self, name: &str) -> Self {
        self.score = Some(name.to_string());
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Renders the ranking expression, binding bm25 weights.
    fn render_score(&self, table: &TableDescriptor, w: &mut Writer) {
        match &self.order {
            RankOrder::Bm25(weights) => {
                w.push("bm25(");
                w.ident(&table.name);
                for column in &table.columns {
                    let weight = weights
                        .iter()
                        .find(|(c, _)| *c == column.name)
                        .map_or(1.0, |(_, weight)| *weight);
                    w.push(", ");
                    w.bind(SqlValue::Float(weight));
                }
                w.push(")");
            }
            RankOrder::Rank | RankOrder::Unordered => w.push("rank"),
        }
    }
}

impl Statement for FtsSearch {
    fn compile_with(&self, compiler: &Compiler<'_>) -> Result<CompiledQuery> {
        let table = compiler.table(&self.table)?;
        let pattern = compile_match(&self.query, table)?;
        let names: Vec<&str> = if self.columns.is_empty() {
            table.column_names()
        } else {
            self.columns.iter().map(String::as_str).collect()
        };
        let mut result_columns = Vec::with_capacity(names.len() + 1);
        for name in &names {
            let column = table
                .column_named(name)
                .ok_or_else(|| CompileError::UnresolvedColumn {
                    table: table.name.clone(),
                    column: (*name).to_string(),
                })?;
            result_columns.push(ResultColumn {
                name: column.name.clone(),
                ty: column.ty,
            });
        }
        if let RankOrder::Bm25(weights) = &self.order {
            for (column, _) in weights {
                if table.column_named(column).is_none() {
                    return Err(CompileError::UnresolvedColumn {
                        table: table.name.clone(),
                        column: column.clone(),
                    });
                }
            }
        }

        let mut w = Writer::default();
        w.push("SELECT ");
        w.list(&result_columns, |w, c| {
            w.ident(&table.name);
            w.push(".");
            w.ident(&c.name);
            w.push(" AS ");
            w.ident(&c.name);
            Ok(())
        })?;
        if let Some(score) = &self.score {
            w.push(", ");
            self.render_score(table, &mut w);
            w.push(" AS ");
            w.ident(score);
            result_columns.push(ResultColumn {
                name: score.clone(),
                ty: ColumnType::Real,
            });
        }
        w.push(" FROM ");
        w.ident(&table.name);
        w.push(" WHERE ");
        w.ident(&table.name);
        w.push(" MATCH ");
        w.bind(SqlValue::Text(pattern));
        if self.order != RankOrder::Unordered {
            w.push(" ORDER BY ");
            self.render_score(table, &mut w);
        }
        if let Some(limit) = self.limit {
            w.push(" LIMIT ");
            w.bind(SqlValue::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        }
        Ok(CompiledQuery {
            sql: w.sql,
            binds: w.binds,
            result_columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, text, FtsOptions, SchemaSnapshot};

    fn docs() -> TableDescriptor {
        TableDescriptor::new("docs")
            .column(text("title"))
            .column(text("body"))
            .full_text(FtsOptions::default())
    }

    fn compile(query: &MatchQuery) -> Result<String> {
        compile_match(query, &docs())
    }

    #[test]
    fn terms_are_quoted() {
        assert_eq!(compile(&MatchQuery::term("web")).unwrap(), "\"web\"");
        assert_eq!(
            compile(&MatchQuery::phrase("say \"hi\"")).unwrap(),
            "\"say \"\"hi\"\"\""
        );
        assert_eq!(compile(&MatchQuery::prefix("sec")).unwrap(), "\"sec\"*");
        assert_eq!(compile(&MatchQuery::starts_with("intro")).unwrap(), "^\"intro\"");
    }

    #[test]
    fn boolean_operators() {
        let and = MatchQuery::and(vec![MatchQuery::term("web"), MatchQuery::term("security")]);
        assert_eq!(compile(&and).unwrap(), "\"web\" AND \"security\"");

        let or_in_and = MatchQuery::and(vec![
            MatchQuery::term("a"),
            MatchQuery::or(vec![MatchQuery::term("b"), MatchQuery::term("c")]),
        ]);
        assert_eq!(compile(&or_in_and).unwrap(), "\"a\" AND (\"b\" OR \"c\")");

        let not = MatchQuery::and(vec![
            MatchQuery::term("a"),
            MatchQuery::term("b"),
            MatchQuery::not(MatchQuery::term("c")),
        ]);
        assert_eq!(compile(&not).unwrap(), "(\"a\" AND \"b\") NOT \"c\"");
    }

    #[test]
    fn near_and_column_filters() {
        assert_eq!(
            compile(&MatchQuery::near(["neural", "networks"], 5)).unwrap(),
            "NEAR(\"neural\" \"networks\", 5)"
        );
        let filtered = MatchQuery::column(
            "title",
            MatchQuery::or(vec![MatchQuery::term("a"), MatchQuery::term("b")]),
        );
        assert_eq!(compile(&filtered).unwrap(), "title : (\"a\" OR \"b\")");
    }

    #[test]
    fn invalid_queries() {
        let invalid = |q: MatchQuery| matches!(compile(&q), Err(CompileError::InvalidMatch(_)));
        assert!(invalid(MatchQuery::not(MatchQuery::term("a"))));
        assert!(invalid(MatchQuery::and(vec![MatchQuery::not(MatchQuery::term("a"))])));
        assert!(invalid(MatchQuery::and(vec![])));
        assert!(invalid(MatchQuery::or(vec![])));
        assert!(invalid(MatchQuery::term("  ")));
        assert!(invalid(MatchQuery::near(["alone"], 3)));
        assert!(invalid(MatchQuery::or(vec![
            MatchQuery::term("a"),
            MatchQuery::not(MatchQuery::term("b"))
        ])));

        assert_eq!(
            compile(&MatchQuery::column("author", MatchQuery::term("x"))),
            Err(CompileError::UnresolvedColumn {
                table: "docs".into(),
                column: "author".into()
            })
        );
    }

    #[test]
    fn search_orders_by_weighted_bm25() {
        let schema = SchemaSnapshot::from_tables(vec![docs()]).unwrap();
        let compiler = Compiler::new(&schema);
        let search = FtsSearch::new("docs", MatchQuery::term("web"))
            .columns(&["title"])
            .order_by_bm25(&[("title", 10.0)])
            .limit(5);
        let compiled = compiler.compile(&search).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"docs\".\"title\" AS \"title\" FROM \"docs\" WHERE \"docs\" MATCH ? \
             ORDER BY bm25(\"docs\", ?, ?) LIMIT ?"
        );
        assert_eq!(
            compiled.binds,
            vec![
                SqlValue::Text("\"web\"".into()),
                SqlValue::Float(10.0),
                SqlValue::Float(1.0),
                SqlValue::Int(5),
            ]
        );
    }

    #[test]
    fn search_with_rank_score() {
        let schema = SchemaSnapshot::from_tables(vec![docs()]).unwrap();
        let compiled = Compiler::new(&schema)
            .compile(
                &FtsSearch::new("docs", MatchQuery::term("web"))
                    .order_by_rank()
                    .with_score("score"),
            )
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"docs\".\"title\" AS \"title\", \"docs\".\"body\" AS \"body\", rank AS \"score\" \
             FROM \"docs\" WHERE \"docs\" MATCH ? ORDER BY rank"
        );
        assert_eq!(compiled.result_columns[2].ty, ColumnType::Real);
    }

    #[test]
    fn search_requires_full_text_table() {
        let schema = SchemaSnapshot::from_tables(vec![TableDescriptor::new("users")
            .column(integer("id").primary_key())])
        .unwrap();
        assert_eq!(
            Compiler::new(&schema).compile(&FtsSearch::new("users", MatchQuery::term("x"))),
            Err(CompileError::NotFullText("users".into()))
        );
    }
}
