//! Expression AST for the query compiler.
//!
//! Expressions are built with [`col`], [`lit`], the constructors in
//! [`functions`] and [`window`], and the operator methods of
//! [`ExprOps`]:
//!
//! ```rust
//! use slate_core::ast::{col, functions::lower, ExprOps};
//!
//! let predicate = lower(col("users", "name")).eq("alice").and(col("users", "age").ge(18));
//! ```

pub mod functions;
pub mod window;

use crate::fts::MatchQuery;
use crate::query::ResultColumn;
use crate::schema::ColumnType;
use crate::value::{ToValue, Value};

pub use functions::ScalarFn;
pub use window::{Aggregate, AggregateFn, Frame, FrameBound, FrameMode, WindowSpec};

/// A reference to a column of a table, table alias or registered subquery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    /// Table name, alias or subquery alias.
    pub source: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Creates a column reference.
    #[must_use]
    pub fn new(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            column: column.into(),
        }
    }
}

/// A subquery registered with a [`Compiler`](crate::query::Compiler).
///
/// Its projected columns are referenced like any table column through
/// [`SubqueryRef::col`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubqueryRef {
    pub(crate) alias: String,
    pub(crate) columns: Vec<ResultColumn>,
}

impl SubqueryRef {
    /// The alias the subquery was registered under.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Projected columns with their types.
    #[must_use]
    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    /// References one of the projected columns.
    #[must_use]
    pub fn col(&self, column: &str) -> ColumnRef {
        ColumnRef::new(self.alias.clone(), column)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
    /// `GLOB`
    Glob,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `||`
    Concat,
}

impl BinaryOp {
    /// SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
            Self::Glob => "GLOB",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Concat => "||",
        }
    }

    /// Binding strength, higher binds tighter (SQLite's ordering).
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne | Self::Is | Self::IsNot | Self::Like | Self::Glob => 4,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 5,
            Self::Add | Self::Sub => 6,
            Self::Mul | Self::Div | Self::Rem => 7,
            Self::Concat => 8,
        }
    }

    /// Returns `true` for operators whose result is boolean.
    #[must_use]
    pub const fn is_predicate(self) -> bool {
        self.precedence() <= 5
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `NOT`
    Not,
    /// `-`
    Neg,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    /// Sort key.
    pub expr: Expr,
    /// Descending order.
    pub desc: bool,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column of a source in scope.
    Column(ColumnRef),
    /// Reference to an output column of the enclosing query.
    Alias(String),
    /// Bound literal.
    Literal(Value),
    /// Scalar function call.
    Call {
        /// Function.
        func: ScalarFn,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `CAST(expr AS type)`.
    Cast {
        /// Operand.
        expr: Box<Expr>,
        /// Target type.
        ty: ColumnType,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        expr: Box<Expr>,
    },
    /// `IS [NOT] NULL`.
    IsNull {
        /// Operand.
        expr: Box<Expr>,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// `[NOT] IN (list)`.
    InList {
        /// Operand.
        expr: Box<Expr>,
        /// Candidates.
        list: Vec<Expr>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// `[NOT] IN (subquery)`.
    InSubquery {
        /// Operand.
        expr: Box<Expr>,
        /// Single-column subquery.
        subquery: SubqueryRef,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// `[NOT] EXISTS (subquery)`.
    Exists {
        /// Subquery.
        subquery: SubqueryRef,
        /// `NOT EXISTS` when set.
        negated: bool,
    },
    /// `[NOT] BETWEEN low AND high`.
    Between {
        /// Operand.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// `NOT BETWEEN` when set.
        negated: bool,
    },
    /// Aggregate or window function.
    Aggregate(Box<Aggregate>),
    /// `CASE WHEN ... THEN ... [ELSE ...] END`.
    Case {
        /// `(condition, result)` pairs.
        branches: Vec<(Expr, Expr)>,
        /// ELSE result.
        otherwise: Option<Box<Expr>>,
    },
    /// Scalar single-column subquery.
    Subquery(SubqueryRef),
    /// `table MATCH query` against a full-text table in scope.
    Match {
        /// Full-text table (or its alias) in scope.
        table: String,
        /// Match query.
        query: MatchQuery,
    },
}

impl Expr {
    /// Returns `true` if the expression contains a plain (non-window)
    /// aggregate outside any subquery.
    #[must_use]
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Self::Aggregate(agg) = e {
                if agg.window.is_none() {
                    found = true;
                }
            }
        });
        found
    }

    /// Returns `true` if the expression contains a window function.
    #[must_use]
    pub fn contains_window(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Self::Aggregate(agg) = e {
                if agg.window.is_some() {
                    found = true;
                }
            }
        });
        found
    }

    /// Visits this node and every descendant, not descending into subqueries.
    pub fn walk(&self, visit: &mut impl FnMut(&Self)) {
        visit(self);
        match self {
            Self::Column(_)
            | Self::Alias(_)
            | Self::Literal(_)
            | Self::Exists { .. }
            | Self::Subquery(_)
            | Self::Match { .. } => {}
            Self::Call { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            Self::Cast { expr, .. }
            | Self::Unary { expr, .. }
            | Self::IsNull { expr, .. }
            | Self::InSubquery { expr, .. } => expr.walk(visit),
            Self::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Self::InList { expr, list, .. } => {
                expr.walk(visit);
                list.iter().for_each(|a| a.walk(visit));
            }
            Self::Between {
                expr, low, high, ..
            } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
            Self::Aggregate(agg) => {
                agg.args.iter().for_each(|a| a.walk(visit));
                if let Some(window) = &agg.window {
                    window.partition_by.iter().for_each(|a| a.walk(visit));
                    window.order_by.iter().for_each(|t| t.expr.walk(visit));
                }
            }
            Self::Case {
                branches,
                otherwise,
            } => {
                for (cond, then) in branches {
                    cond.walk(visit);
                    then.walk(visit);
                }
                if let Some(e) = otherwise {
                    e.walk(visit);
                }
            }
        }
    }

    /// Splits a tree of `AND`s into its conjuncts.
    #[must_use]
    pub fn into_conjuncts(self) -> Vec<Self> {
        match self {
            Self::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut out = left.into_conjuncts();
                out.extend(right.into_conjuncts());
                out
            }
            other => vec![other],
        }
    }

    fn binary(self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }
}

/// Conversion into an expression. Implemented for expressions, column
/// references, aggregates and every [`ToValue`] literal type.
pub trait IntoExpr {
    /// Converts `self` into an expression.
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for ColumnRef {
    fn into_expr(self) -> Expr {
        Expr::Column(self)
    }
}

impl IntoExpr for Aggregate {
    fn into_expr(self) -> Expr {
        Expr::Aggregate(Box::new(self))
    }
}

macro_rules! impl_into_expr_literal {
    ($($t:ty),*) => {
        $(impl IntoExpr for $t {
            fn into_expr(self) -> Expr {
                Expr::Literal(self.to_value())
            }
        })*
    };
}

impl_into_expr_literal!(
    Value,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    &String,
    Vec<u8>,
    &[u8],
    chrono::DateTime<chrono::Utc>,
    serde_json::Value
);

impl<T: ToValue> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::Literal(self.to_value())
    }
}

/// Operator methods shared by expressions, column references and aggregates.
pub trait ExprOps: IntoExpr + Sized {
    /// `self = rhs`
    fn eq(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Eq, rhs.into_expr())
    }

    /// `self <> rhs`
    fn ne(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Ne, rhs.into_expr())
    }

    /// `self < rhs`
    fn lt(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Lt, rhs.into_expr())
    }

    /// `self <= rhs`
    fn le(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Le, rhs.into_expr())
    }

    /// `self > rhs`
    fn gt(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Gt, rhs.into_expr())
    }

    /// `self >= rhs`
    fn ge(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Ge, rhs.into_expr())
    }

    /// `self LIKE pattern`
    fn like(self, pattern: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Like, pattern.into_expr())
    }

    /// `self GLOB pattern`
    fn glob(self, pattern: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Glob, pattern.into_expr())
    }

    /// `self IS rhs` (null-safe equality)
    fn is(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Is, rhs.into_expr())
    }

    /// `self IS NOT rhs`
    fn is_not(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::IsNot, rhs.into_expr())
    }

    /// `self AND rhs`
    fn and(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::And, rhs.into_expr())
    }

    /// `self OR rhs`
    fn or(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Or, rhs.into_expr())
    }

    /// `NOT self`
    fn not(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self.into_expr()),
        }
    }

    /// `-self`
    fn neg(self) -> Expr {
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(self.into_expr()),
        }
    }

    /// `self + rhs`
    fn add(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Add, rhs.into_expr())
    }

    /// `self - rhs`
    fn sub(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Sub, rhs.into_expr())
    }

    /// `self * rhs`
    fn mul(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Mul, rhs.into_expr())
    }

    /// `self / rhs`
    fn div(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Div, rhs.into_expr())
    }

    /// `self % rhs`
    fn rem(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Rem, rhs.into_expr())
    }

    /// `self || rhs`
    fn concat(self, rhs: impl IntoExpr) -> Expr {
        self.into_expr().binary(BinaryOp::Concat, rhs.into_expr())
    }

    /// `self IS NULL`
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    /// `self IS NOT NULL`
    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    /// `self IN (values...)`
    fn in_list<I, T>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        Expr::InList {
            expr: Box::new(self.into_expr()),
            list: values.into_iter().map(IntoExpr::into_expr).collect(),
            negated: false,
        }
    }

    /// `self NOT IN (values...)`
    fn not_in_list<I, T>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: IntoExpr,
    {
        Expr::InList {
            expr: Box::new(self.into_expr()),
            list: values.into_iter().map(IntoExpr::into_expr).collect(),
            negated: true,
        }
    }

    /// `self IN (subquery)`
    fn in_subquery(self, subquery: &SubqueryRef) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: subquery.clone(),
            negated: false,
        }
    }

    /// `self NOT IN (subquery)`
    fn not_in_subquery(self, subquery: &SubqueryRef) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self.into_expr()),
            subquery: subquery.clone(),
            negated: true,
        }
    }

    /// `self BETWEEN low AND high`
    fn between(self, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
        Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into_expr()),
            high: Box::new(high.into_expr()),
            negated: false,
        }
    }

    /// `self NOT BETWEEN low AND high`
    fn not_between(self, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
        Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into_expr()),
            high: Box::new(high.into_expr()),
            negated: true,
        }
    }
}

impl ExprOps for Expr {}
impl ExprOps for ColumnRef {}
impl ExprOps for Aggregate {}

/// A column reference expression.
#[must_use]
pub fn col(source: &str, column: &str) -> ColumnRef {
    ColumnRef::new(source, column)
}

/// A bound literal.
#[must_use]
pub fn lit(value: impl ToValue) -> Expr {
    Expr::Literal(value.to_value())
}

/// A reference to an output column of the enclosing query.
#[must_use]
pub fn alias(name: &str) -> Expr {
    Expr::Alias(name.to_string())
}

/// `EXISTS (subquery)`
#[must_use]
pub fn exists(subquery: &SubqueryRef) -> Expr {
    Expr::Exists {
        subquery: subquery.clone(),
        negated: false,
    }
}

/// `NOT EXISTS (subquery)`
#[must_use]
pub fn not_exists(subquery: &SubqueryRef) -> Expr {
    Expr::Exists {
        subquery: subquery.clone(),
        negated: true,
    }
}

/// A scalar subquery.
#[must_use]
pub fn scalar(subquery: &SubqueryRef) -> Expr {
    Expr::Subquery(subquery.clone())
}

/// `table MATCH query`.
#[must_use]
pub fn matches(table: &str, query: MatchQuery) -> Expr {
    Expr::Match {
        table: table.to_string(),
        query,
    }
}

/// Builder for `CASE` expressions.
#[derive(Debug, Clone, Default)]
pub struct CaseBuilder {
    branches: Vec<(Expr, Expr)>,
}

/// Starts a `CASE` expression.
#[must_use]
pub fn case() -> CaseBuilder {
    CaseBuilder::default()
}

impl CaseBuilder {
    /// Adds a `WHEN cond THEN result` branch.
    #[must_use]
    pub fn when(mut self, cond: impl IntoExpr, result: impl IntoExpr) -> Self {
        self.branches.push((cond.into_expr(), result.into_expr()));
        self
    }

    /// Finishes with an `ELSE` branch.
    #[must_use]
    pub fn otherwise(self, result: impl IntoExpr) -> Expr {
        Expr::Case {
            branches: self.branches,
            otherwise: Some(Box::new(result.into_expr())),
        }
    }

    /// Finishes without an `ELSE` branch.
    #[must_use]
    pub fn end(self) -> Expr {
        Expr::Case {
            branches: self.branches,
            otherwise: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::window::count;

    #[test]
    fn conjuncts_flatten_nested_ands() {
        let e = col("t", "a")
            .eq(1)
            .and(col("t", "b").eq(2).and(col("t", "c").eq(3)))
            .and(col("t", "d").eq(4).or(col("t", "e").eq(5)));
        let parts = e.into_conjuncts();
        assert_eq!(parts.len(), 4);
        assert!(matches!(
            parts[3],
            Expr::Binary {
                op: BinaryOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn aggregate_detection_skips_windows() {
        let plain = count(col("t", "id")).gt(2);
        assert!(plain.contains_aggregate());
        let windowed = count(col("t", "id")).over(WindowSpec::new()).into_expr();
        assert!(!windowed.contains_aggregate());
        assert!(windowed.contains_window());
    }

    #[test]
    fn literals_convert() {
        assert_eq!(5_i64.into_expr(), Expr::Literal(Value::Integer(5)));
        assert_eq!("x".into_expr(), Expr::Literal(Value::Text("x".into())));
        assert_eq!(None::<i64>.into_expr(), Expr::Literal(Value::Null));
    }
}
