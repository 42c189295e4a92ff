//! Aggregate and window functions.

use super::{Expr, IntoExpr, OrderTerm};

/// Aggregate, ranking and value functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    /// `count(x)`
    Count,
    /// `count(*)`
    CountAll,
    /// `sum(x)`
    Sum,
    /// `total(x)`, always real
    Total,
    /// `avg(x)`
    Avg,
    /// `min(x)`
    Min,
    /// `max(x)`
    Max,
    /// `group_concat(x [, sep])`
    GroupConcat,
    /// `row_number()`
    RowNumber,
    /// `rank()`
    Rank,
    /// `dense_rank()`
    DenseRank,
    /// `percent_rank()`
    PercentRank,
    /// `cume_dist()`
    CumeDist,
    /// `ntile(n)`
    Ntile,
    /// `lag(x [, offset [, default]])`
    Lag,
    /// `lead(x [, offset [, default]])`
    Lead,
    /// `first_value(x)`
    FirstValue,
    /// `last_value(x)`
    LastValue,
    /// `nth_value(x, n)`
    NthValue,
}

impl AggregateFn {
    /// SQLite function name.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Count | Self::CountAll => "count",
            Self::Sum => "sum",
            Self::Total => "total",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::GroupConcat => "group_concat",
            Self::RowNumber => "row_number",
            Self::Rank => "rank",
            Self::DenseRank => "dense_rank",
            Self::PercentRank => "percent_rank",
            Self::CumeDist => "cume_dist",
            Self::Ntile => "ntile",
            Self::Lag => "lag",
            Self::Lead => "lead",
            Self::FirstValue => "first_value",
            Self::LastValue => "last_value",
            Self::NthValue => "nth_value",
        }
    }

    /// Minimum and maximum argument count.
    #[must_use]
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Self::CountAll
            | Self::RowNumber
            | Self::Rank
            | Self::DenseRank
            | Self::PercentRank
            | Self::CumeDist => (0, 0),
            Self::Count
            | Self::Sum
            | Self::Total
            | Self::Avg
            | Self::Min
            | Self::Max
            | Self::Ntile
            | Self::FirstValue
            | Self::LastValue => (1, 1),
            Self::GroupConcat => (1, 2),
            Self::NthValue => (2, 2),
            Self::Lag | Self::Lead => (1, 3),
        }
    }

    /// Ranking and value functions only exist inside an OVER clause.
    #[must_use]
    pub const fn requires_window(self) -> bool {
        matches!(
            self,
            Self::RowNumber
                | Self::Rank
                | Self::DenseRank
                | Self::PercentRank
                | Self::CumeDist
                | Self::Ntile
                | Self::Lag
                | Self::Lead
                | Self::FirstValue
                | Self::LastValue
                | Self::NthValue
        )
    }

    /// Whether the result depends on the window frame. Ranking
    /// functions and lag/lead ignore it.
    #[must_use]
    pub const fn uses_frame(self) -> bool {
        !matches!(
            self,
            Self::RowNumber
                | Self::Rank
                | Self::DenseRank
                | Self::PercentRank
                | Self::CumeDist
                | Self::Ntile
                | Self::Lag
                | Self::Lead
        )
    }
}

/// Frame unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Physical rows.
    Rows,
    /// Logical range over the ORDER BY key.
    Range,
}

/// One end of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    /// `UNBOUNDED PRECEDING`
    UnboundedPreceding,
    /// `n PRECEDING`
    Preceding(u64),
    /// `CURRENT ROW`
    CurrentRow,
    /// `n FOLLOWING`
    Following(u64),
    /// `UNBOUNDED FOLLOWING`
    UnboundedFollowing,
}

impl FrameBound {
    pub(crate) const fn position(self) -> u8 {
        match self {
            Self::UnboundedPreceding => 0,
            Self::Preceding(_) => 1,
            Self::CurrentRow => 2,
            Self::Following(_) => 3,
            Self::UnboundedFollowing => 4,
        }
    }

    pub(crate) const fn offset(self) -> Option<u64> {
        match self {
            Self::Preceding(n) | Self::Following(n) => Some(n),
            _ => None,
        }
    }
}

/// `ROWS|RANGE BETWEEN start AND end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Unit.
    pub mode: FrameMode,
    /// Start bound.
    pub start: FrameBound,
    /// End bound.
    pub end: FrameBound,
}

impl Frame {
    /// `ROWS BETWEEN start AND end`.
    #[must_use]
    pub const fn rows(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Rows,
            start,
            end,
        }
    }

    /// `RANGE BETWEEN start AND end`.
    #[must_use]
    pub const fn range(start: FrameBound, end: FrameBound) -> Self {
        Self {
            mode: FrameMode::Range,
            start,
            end,
        }
    }

    /// The frame used when none is given:
    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`.
    #[must_use]
    pub const fn standard() -> Self {
        Self::range(FrameBound::UnboundedPreceding, FrameBound::CurrentRow)
    }
}

/// The OVER clause of a window function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSpec {
    /// PARTITION BY expressions.
    pub partition_by: Vec<Expr>,
    /// ORDER BY terms.
    pub order_by: Vec<OrderTerm>,
    /// Explicit frame.
    pub frame: Option<Frame>,
}

impl WindowSpec {
    /// An empty window: the whole result set is one partition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a PARTITION BY expression.
    #[must_use]
    pub fn partition_by(mut self, expr: impl IntoExpr) -> Self {
        self.partition_by.push(expr.into_expr());
        self
    }

    /// Adds an ascending ORDER BY term.
    #[must_use]
    pub fn order_by(mut self, expr: impl IntoExpr) -> Self {
        self.order_by.push(OrderTerm {
            expr: expr.into_expr(),
            desc: false,
        });
        self
    }

    /// Adds a descending ORDER BY term.
    #[must_use]
    pub fn order_by_desc(mut self, expr: impl IntoExpr) -> Self {
        self.order_by.push(OrderTerm {
            expr: expr.into_expr(),
            desc: true,
        });
        self
    }

    /// Sets the frame.
    #[must_use]
    pub const fn frame(mut self, frame: Frame) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// An aggregate or window function application.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Function.
    pub func: AggregateFn,
    /// Arguments.
    pub args: Vec<Expr>,
    /// `DISTINCT` modifier.
    pub distinct: bool,
    /// OVER clause; `None` for a plain aggregate.
    pub window: Option<WindowSpec>,
}

impl Aggregate {
    /// Creates a plain aggregate.
    #[must_use]
    pub const fn new(func: AggregateFn, args: Vec<Expr>) -> Self {
        Self {
            func,
            args,
            distinct: false,
            window: None,
        }
    }

    /// Applies `DISTINCT` to the argument.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Turns the aggregate into a window function.
    #[must_use]
    pub fn over(mut self, window: WindowSpec) -> Self {
        self.window = Some(window);
        self
    }
}

macro_rules! aggregate0 {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "()`")]
            #[must_use]
            pub const fn $name() -> Aggregate {
                Aggregate::new(AggregateFn::$func, Vec::new())
            }
        )*
    };
}

macro_rules! aggregate1 {
    ($($name:ident => $func:ident),* $(,)?) => {
        $(
            #[doc = concat!("`", stringify!($name), "(x)`")]
            #[must_use]
            pub fn $name(x: impl IntoExpr) -> Aggregate {
                Aggregate::new(AggregateFn::$func, vec![x.into_expr()])
            }
        )*
    };
}

aggregate0!(
    count_all => CountAll,
    row_number => RowNumber,
    rank => Rank,
    dense_rank => DenseRank,
    percent_rank => PercentRank,
    cume_dist => CumeDist,
);

aggregate1!(
    count => Count,
    sum => Sum,
    total => Total,
    avg => Avg,
    min => Min,
    max => Max,
    group_concat => GroupConcat,
    lag => Lag,
    lead => Lead,
    first_value => FirstValue,
    last_value => LastValue,
);

/// `count(DISTINCT x)`
#[must_use]
pub fn count_distinct(x: impl IntoExpr) -> Aggregate {
    count(x).distinct()
}

/// `ntile(n)`
#[must_use]
pub fn ntile(n: u32) -> Aggregate {
    Aggregate::new(AggregateFn::Ntile, vec![n.into_expr()])
}

/// `nth_value(x, n)`
#[must_use]
pub fn nth_value(x: impl IntoExpr, n: u32) -> Aggregate {
    Aggregate::new(AggregateFn::NthValue, vec![x.into_expr(), n.into_expr()])
}

/// `lag(x, offset, default)`
#[must_use]
pub fn lag_by(x: impl IntoExpr, offset: u32, default: impl IntoExpr) -> Aggregate {
    Aggregate::new(
        AggregateFn::Lag,
        vec![x.into_expr(), offset.into_expr(), default.into_expr()],
    )
}

/// `lead(x, offset, default)`
#[must_use]
pub fn lead_by(x: impl IntoExpr, offset: u32, default: impl IntoExpr) -> Aggregate {
    Aggregate::new(
        AggregateFn::Lead,
        vec![x.into_expr(), offset.into_expr(), default.into_expr()],
    )
}

/// `group_concat(x, separator)`
#[must_use]
pub fn group_concat_with(x: impl IntoExpr, separator: &str) -> Aggregate {
    Aggregate::new(
        AggregateFn::GroupConcat,
        vec![x.into_expr(), separator.into_expr()],
    )
}
