//! SELECT compilation: source resolution, validation, result typing and
//! SQL rendering.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::functions::ReturnType;
use crate::ast::{
    Aggregate, AggregateFn, BinaryOp, ColumnRef, Expr, Frame, FrameBound, FrameMode, OrderTerm,
    SubqueryRef, UnaryOp,
};
use crate::dialect::sql_type;
use crate::error::{CompileError, Result};
use crate::schema::{ColumnType, SchemaSnapshot, TableDescriptor};
use crate::value::{encode, encode_for, SqlValue, Value};

use super::scope::{Scope, SourceColumns, Writer};
use super::{CompiledQuery, Join, Query, ResultColumn, Statement};

/// Binding strength of column references, literals and calls.
const ATOM: u8 = 10;

/// Clause an expression is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    Select,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Window,
    Argument,
    Set,
}

impl Clause {
    const fn allows_aggregate(self) -> bool {
        matches!(self, Self::Select | Self::Having | Self::OrderBy | Self::Window)
    }

    const fn allows_window(self) -> bool {
        matches!(self, Self::Select | Self::OrderBy)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Where => "WHERE",
            Self::GroupBy => "GROUP BY",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER BY",
            Self::Window => "OVER",
            Self::Argument => "an aggregate argument",
            Self::Set => "SET",
        }
    }
}

/// What an expression can see while it is analyzed or rendered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ctx<'a, 'c> {
    pub(crate) scope: &'a Scope<'c>,
    pub(crate) outputs: &'a [(String, Expr)],
    pub(crate) ctes: &'a [String],
    pub(crate) allow_aliases: bool,
}

impl<'a> Ctx<'a, '_> {
    fn output(&self, name: &str) -> Option<&'a Expr> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Reports whether `expr` holds a plain aggregate and whether it holds
    /// a window function, looking through output aliases.
    fn inspect(&self, expr: &Expr) -> (bool, bool) {
        let mut aggregate = false;
        let mut window = false;
        expr.walk(&mut |e| match e {
            Expr::Aggregate(agg) if agg.window.is_some() => window = true,
            Expr::Aggregate(_) => aggregate = true,
            Expr::Alias(name) => {
                if let Some(target) = self.output(name) {
                    aggregate |= target.contains_aggregate();
                    window |= target.contains_window();
                }
            }
            _ => {}
        });
        (aggregate, window)
    }
}

#[derive(Debug, Clone)]
struct Registered {
    order: usize,
    query: Query,
    columns: Vec<ResultColumn>,
}

struct ResolvedJoin<'q> {
    join: &'q Join,
    name: String,
    target: String,
}

/// Compiles statements against one schema snapshot and a registry of
/// named subqueries.
///
/// Compilation is pure: the same inputs always produce byte-identical
/// SQL and the same bind order.
#[derive(Debug, Clone)]
pub struct Compiler<'s> {
    schema: &'s SchemaSnapshot,
    subqueries: BTreeMap<String, Registered>,
}

impl<'s> Compiler<'s> {
    /// Creates a compiler with an empty subquery registry.
    #[must_use]
    pub const fn new(schema: &'s SchemaSnapshot) -> Self {
        Self {
            schema,
            subqueries: BTreeMap::new(),
        }
    }

    /// The schema statements are resolved against.
    #[must_use]
    pub const fn schema(&self) -> &'s SchemaSnapshot {
        self.schema
    }

    /// Registers `query` under `alias` and returns a handle whose columns
    /// can be referenced by later queries.
    ///
    /// # Errors
    ///
    /// Fails if the alias is taken by a table or another subquery, or if
    /// the query itself does not compile.
    pub fn register(&mut self, alias: &str, query: Query) -> Result<SubqueryRef> {
        if self.schema.table(alias).is_some() {
            return Err(CompileError::InvalidSubquery(format!(
                "alias '{alias}' shadows a table"
            )));
        }
        if self.subqueries.contains_key(alias) {
            return Err(CompileError::InvalidSubquery(format!(
                "alias '{alias}' is already registered"
            )));
        }
        let columns = self.compile_select(&query)?.result_columns;
        let order = self.subqueries.len();
        self.subqueries.insert(
            alias.to_string(),
            Registered {
                order,
                query,
                columns: columns.clone(),
            },
        );
        Ok(SubqueryRef {
            alias: alias.to_string(),
            columns,
        })
    }

    /// Compiles any [`Statement`].
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`] found; nothing is partially
    /// rendered.
    pub fn compile<S: Statement + ?Sized>(&self, statement: &S) -> Result<CompiledQuery> {
        statement.compile_with(self)
    }

    pub(crate) fn table(&self, name: &str) -> Result<&'s TableDescriptor> {
        self.schema
            .table(name)
            .ok_or_else(|| CompileError::UnknownTable(name.to_string()))
    }

    fn registered(&self, alias: &str) -> Result<&Registered> {
        self.subqueries.get(alias).ok_or_else(|| {
            CompileError::InvalidSubquery(format!("'{alias}' is not registered with this compiler"))
        })
    }

    pub(crate) fn compile_select(&self, query: &Query) -> Result<CompiledQuery> {
        let ctes = self.plan_ctes(query);
        let mut w = Writer::default();
        if !ctes.is_empty() {
            w.push("WITH ");
            w.list(&ctes, |w, alias| {
                let registered = self.registered(alias)?;
                w.ident(alias);
                w.push(" AS (");
                self.render_select(&registered.query, &ctes, w)?;
                w.push(")");
                Ok(())
            })?;
            w.push(" ");
        }
        let result_columns = self.render_select(query, &ctes, &mut w)?;
        Ok(CompiledQuery {
            sql: w.sql,
            binds: w.binds,
            result_columns,
        })
    }

    // ========================================================================
    // Common table expressions
    // ========================================================================

    /// Subqueries referenced at least twice, in registration order so that
    /// every CTE only refers to earlier ones.
    fn plan_ctes(&self, query: &Query) -> Vec<String> {
        let mut counts = BTreeMap::new();
        let mut visited = BTreeSet::new();
        self.count_references(query, &mut counts, &mut visited);
        let mut shared: Vec<(usize, String)> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .filter_map(|(alias, _)| self.subqueries.get(&alias).map(|r| (r.order, alias)))
            .collect();
        shared.sort();
        shared.into_iter().map(|(_, alias)| alias).collect()
    }

    fn count_references(
        &self,
        query: &Query,
        counts: &mut BTreeMap<String, usize>,
        visited: &mut BTreeSet<String>,
    ) {
        for alias in self.direct_references(query) {
            *counts.entry(alias.clone()).or_insert(0) += 1;
            if visited.insert(alias.clone()) {
                if let Some(registered) = self.subqueries.get(&alias) {
                    self.count_references(&registered.query, counts, visited);
                }
            }
        }
    }

    fn direct_references(&self, query: &Query) -> Vec<String> {
        let is_subquery =
            |name: &str| self.schema.table(name).is_none() && self.subqueries.contains_key(name);
        let mut refs = Vec::new();
        let mut in_scope = vec![query.from_scope_name().to_string()];
        if query.from_alias.is_none() && is_subquery(&query.from) {
            refs.push(query.from.clone());
        }
        for join in &query.joins {
            let Some((left, right)) = join.pairs.first() else {
                continue;
            };
            let joined = if in_scope.contains(&left.source) {
                &right.source
            } else {
                &left.source
            };
            if join.table.is_none() && is_subquery(joined) {
                refs.push(joined.clone());
            }
            in_scope.push(joined.clone());
        }

        let mut visit = |e: &Expr| match e {
            Expr::InSubquery { subquery, .. }
            | Expr::Exists { subquery, .. }
            | Expr::Subquery(subquery) => refs.push(subquery.alias.clone()),
            _ => {}
        };
        for (_, expr) in &query.select {
            expr.walk(&mut visit);
        }
        for expr in query.filters.iter().chain(&query.group_by).chain(&query.having) {
            expr.walk(&mut visit);
        }
        for term in &query.order_by {
            term.expr.walk(&mut visit);
        }
        refs
    }

    // ========================================================================
    // SELECT
    // ========================================================================

    fn resolve_source(&self, name: &str, table_only: bool) -> Result<SourceColumns<'_>> {
        if let Some(table) = self.schema.table(name) {
            return Ok(SourceColumns::Table(table));
        }
        match self.subqueries.get(name) {
            Some(registered) if !table_only => Ok(SourceColumns::Subquery(&registered.columns)),
            _ => Err(CompileError::UnknownTable(name.to_string())),
        }
    }

    fn resolve_joins<'q, 'c>(
        &'c self,
        query: &'q Query,
        scope: &mut Scope<'c>,
    ) -> Result<Vec<ResolvedJoin<'q>>> {
        let mut resolved = Vec::with_capacity(query.joins.len());
        for join in &query.joins {
            let Some((left, right)) = join.pairs.first() else {
                return Err(CompileError::InvalidJoin("join has no column pairs".into()));
            };
            let joined = match (scope.contains(&left.source), scope.contains(&right.source)) {
                (true, false) => right.source.clone(),
                (false, true) => left.source.clone(),
                (true, true) => {
                    return Err(CompileError::InvalidJoin(format!(
                        "both '{}' and '{}' are already in scope",
                        left.source, right.source
                    )))
                }
                (false, false) => {
                    return Err(CompileError::InvalidJoin(format!(
                        "neither '{}' nor '{}' is in scope",
                        left.source, right.source
                    )))
                }
            };
            let target = join.table.clone().unwrap_or_else(|| joined.clone());
            scope.add(&joined, self.resolve_source(&target, join.table.is_some())?)?;

            for (l, r) in &join.pairs {
                if (l.source == joined) == (r.source == joined) {
                    return Err(CompileError::InvalidJoin(format!(
                        "{}.{} = {}.{} does not connect '{joined}' to the query",
                        l.source, l.column, r.source, r.column
                    )));
                }
                scope.column_type(l)?;
                scope.column_type(r)?;
            }
            resolved.push(ResolvedJoin {
                join,
                name: joined,
                target,
            });
        }
        Ok(resolved)
    }

    fn render_select(&self, query: &Query, ctes: &[String], w: &mut Writer) -> Result<Vec<ResultColumn>> {
        let from = self.resolve_source(&query.from, query.from_alias.is_some())?;
        let mut scope = Scope::default();
        scope.add(query.from_scope_name(), from)?;
        let joins = self.resolve_joins(query, &mut scope)?;

        let outputs: Vec<(String, Expr)> = if query.select.is_empty() {
            from.all()
                .into_iter()
                .map(|c| {
                    let expr = Expr::Column(ColumnRef::new(query.from_scope_name(), c.name.as_str()));
                    (c.name, expr)
                })
                .collect()
        } else {
            query.select.clone()
        };
        let mut names = BTreeSet::new();
        for (name, _) in &outputs {
            if !names.insert(name.as_str()) {
                return Err(CompileError::DuplicateOutput(name.clone()));
            }
        }

        let ctx = Ctx {
            scope: &scope,
            outputs: &outputs,
            ctes,
            allow_aliases: true,
        };
        let (wheres, havings) = route_filters(&ctx, query)?;

        let output_ctx = Ctx {
            allow_aliases: false,
            ..ctx
        };
        let mut columns = Vec::with_capacity(outputs.len());
        for (name, expr) in &outputs {
            let ty = self.analyze(&output_ctx, expr, Clause::Select)?;
            columns.push(ResultColumn {
                name: name.clone(),
                ty: ty.unwrap_or(ColumnType::Text),
            });
        }
        for expr in &wheres {
            self.analyze(&ctx, expr, Clause::Where)?;
        }
        for expr in &query.group_by {
            self.analyze(&ctx, expr, Clause::GroupBy)?;
        }
        for expr in &havings {
            self.analyze(&ctx, expr, Clause::Having)?;
        }
        for term in &query.order_by {
            self.analyze(&ctx, &term.expr, Clause::OrderBy)?;
        }

        w.push("SELECT ");
        if query.distinct {
            w.push("DISTINCT ");
        }
        w.list(&outputs, |w, (name, expr)| {
            self.render_expr(&output_ctx, expr, Clause::Select, w)?;
            w.push(" AS ");
            w.ident(name);
            Ok(())
        })?;
        w.push(" FROM ");
        self.render_source(&query.from, query.from_scope_name(), ctes, w)?;
        for resolved in &joins {
            w.push(" ");
            w.push(resolved.join.kind.as_sql());
            w.push(" ");
            self.render_source(&resolved.target, &resolved.name, ctes, w)?;
            w.push(" ON ");
            for (i, (l, r)) in resolved.join.pairs.iter().enumerate() {
                if i > 0 {
                    w.push(" AND ");
                }
                w.column(l);
                w.push(" = ");
                w.column(r);
            }
        }
        if !wheres.is_empty() {
            w.push(" WHERE ");
            self.render_conjuncts(&ctx, &wheres, Clause::Where, w)?;
        }
        if !query.group_by.is_empty() {
            w.push(" GROUP BY ");
            w.list(&query.group_by, |w, e| self.render_expr(&ctx, e, Clause::GroupBy, w))?;
        }
        if !havings.is_empty() {
            w.push(" HAVING ");
            self.render_conjuncts(&ctx, &havings, Clause::Having, w)?;
        }
        if !query.order_by.is_empty() {
            w.push(" ORDER BY ");
            w.list(&query.order_by, |w, t| self.render_order_term(&ctx, t, Clause::OrderBy, w))?;
        }
        render_limit(query.limit, query.offset, w);
        Ok(columns)
    }

    fn render_source(&self, target: &str, name: &str, ctes: &[String], w: &mut Writer) -> Result<()> {
        if self.schema.table(target).is_some() {
            w.ident(target);
            if name != target {
                w.push(" AS ");
                w.ident(name);
            }
            return Ok(());
        }
        if ctes.iter().any(|c| c == target) {
            w.ident(target);
            return Ok(());
        }
        let registered = self.registered(target)?;
        w.push("(");
        self.render_select(&registered.query, ctes, w)?;
        w.push(") AS ");
        w.ident(name);
        Ok(())
    }

    /// Body of an IN, EXISTS or scalar subquery.
    fn render_subquery_body(&self, subquery: &SubqueryRef, ctes: &[String], w: &mut Writer) -> Result<()> {
        if ctes.iter().any(|c| *c == subquery.alias) {
            w.push("SELECT * FROM ");
            w.ident(&subquery.alias);
            return Ok(());
        }
        let registered = self.registered(&subquery.alias)?;
        self.render_select(&registered.query, ctes, w)?;
        Ok(())
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    /// Validates `expr` for `clause` and returns its type, `None` when it
    /// is only known to be NULL.
    pub(crate) fn analyze(&self, ctx: &Ctx<'_, '_>, expr: &Expr, clause: Clause) -> Result<Option<ColumnType>> {
        match expr {
            Expr::Column(column) => ctx.scope.column_type(column).map(Some),
            Expr::Alias(name) => {
                if !ctx.allow_aliases {
                    return Err(CompileError::InvalidExpression(format!(
                        "alias '{name}' cannot be referenced here"
                    )));
                }
                let target = ctx
                    .output(name)
                    .ok_or_else(|| CompileError::UnknownAlias(name.clone()))?;
                if target.contains_aggregate() && !clause.allows_aggregate() {
                    return Err(CompileError::MisplacedAggregate(format!(
                        "alias '{name}' refers to an aggregate in {}",
                        clause.name()
                    )));
                }
                if target.contains_window() && !clause.allows_window() {
                    return Err(CompileError::MisplacedAggregate(format!(
                        "alias '{name}' refers to a window function in {}",
                        clause.name()
                    )));
                }
                let inner = Ctx {
                    allow_aliases: false,
                    ..*ctx
                };
                self.analyze(&inner, target, Clause::Select)
            }
            Expr::Literal(value) => Ok(value.column_type()),
            Expr::Call { func, args } => {
                func.check_arity(args.len())?;
                let types = args
                    .iter()
                    .map(|a| self.analyze(ctx, a, clause))
                    .collect::<Result<Vec<_>>>()?;
                Ok(match func.return_type() {
                    ReturnType::Fixed(ty) => Some(ty),
                    ReturnType::Arg(i) => types.get(i).copied().flatten(),
                    ReturnType::Numeric => match types.first().copied().flatten() {
                        Some(ColumnType::Integer | ColumnType::Boolean) => Some(ColumnType::Integer),
                        Some(_) => Some(ColumnType::Real),
                        None => None,
                    },
                    ReturnType::FirstKnown => types.iter().find_map(|t| *t),
                })
            }
            Expr::Cast { expr, ty } => {
                self.analyze(ctx, expr, clause)?;
                Ok(Some(*ty))
            }
            Expr::Binary { op, left, right } => {
                let l = self.analyze(ctx, left, clause)?;
                let r = self.analyze(ctx, right, clause)?;
                if compares(*op) {
                    check_literal(ctx, left, right)?;
                    check_literal(ctx, right, left)?;
                }
                Ok(binary_type(*op, l, r))
            }
            Expr::Unary { op, expr } => {
                let ty = self.analyze(ctx, expr, clause)?;
                Ok(match op {
                    UnaryOp::Not => Some(ColumnType::Boolean),
                    UnaryOp::Neg => ty,
                })
            }
            Expr::IsNull { expr, .. } => {
                self.analyze(ctx, expr, clause)?;
                Ok(Some(ColumnType::Boolean))
            }
            Expr::InList { expr, list, .. } => {
                self.analyze(ctx, expr, clause)?;
                for item in list {
                    self.analyze(ctx, item, clause)?;
                    check_literal(ctx, expr, item)?;
                }
                Ok(Some(ColumnType::Boolean))
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.analyze(ctx, expr, clause)?;
                self.single_column(subquery)?;
                Ok(Some(ColumnType::Boolean))
            }
            Expr::Exists { subquery, .. } => {
                self.registered(&subquery.alias)?;
                Ok(Some(ColumnType::Boolean))
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.analyze(ctx, expr, clause)?;
                self.analyze(ctx, low, clause)?;
                self.analyze(ctx, high, clause)?;
                check_literal(ctx, expr, low)?;
                check_literal(ctx, expr, high)?;
                Ok(Some(ColumnType::Boolean))
            }
            Expr::Aggregate(agg) => self.analyze_aggregate(ctx, agg, clause),
            Expr::Case {
                branches,
                otherwise,
            } => {
                if branches.is_empty() {
                    return Err(CompileError::InvalidExpression("CASE without WHEN branches".into()));
                }
                let mut ty = None;
                for (cond, then) in branches {
                    self.analyze(ctx, cond, clause)?;
                    ty = ty.or(self.analyze(ctx, then, clause)?);
                }
                if let Some(otherwise) = otherwise {
                    ty = ty.or(self.analyze(ctx, otherwise, clause)?);
                }
                Ok(ty)
            }
            Expr::Subquery(subquery) => Ok(Some(self.single_column(subquery)?.ty)),
            Expr::Match { table, query } => {
                crate::fts::compile_match(query, match_table(ctx, table)?)?;
                Ok(Some(ColumnType::Boolean))
            }
        }
    }

    fn single_column(&self, subquery: &SubqueryRef) -> Result<&ResultColumn> {
        match self.registered(&subquery.alias)?.columns.as_slice() {
            [column] => Ok(column),
            columns => Err(CompileError::InvalidSubquery(format!(
                "'{}' projects {} columns where exactly one is required",
                subquery.alias,
                columns.len()
            ))),
        }
    }

    fn analyze_aggregate(&self, ctx: &Ctx<'_, '_>, agg: &Aggregate, clause: Clause) -> Result<Option<ColumnType>> {
        let name = agg.func.sql_name();
        match &agg.window {
            None if agg.func.requires_window() => {
                return Err(CompileError::WindowRequired(name.to_string()))
            }
            None if !clause.allows_aggregate() => {
                return Err(CompileError::MisplacedAggregate(format!("{name}() in {}", clause.name())))
            }
            Some(_) if !clause.allows_window() => {
                return Err(CompileError::MisplacedAggregate(format!(
                    "window function {name}() in {}",
                    clause.name()
                )))
            }
            Some(_) if agg.distinct => {
                return Err(CompileError::MisplacedAggregate(format!(
                    "DISTINCT is not supported for window function {name}()"
                )))
            }
            _ => {}
        }

        let (min, max) = agg.func.arity();
        let found = agg.args.len();
        if found < min || found > max || (agg.distinct && found != 1) {
            let expected = if agg.distinct {
                "1".to_string()
            } else if min == max {
                min.to_string()
            } else {
                format!("{min}..={max}")
            };
            return Err(CompileError::ArityMismatch {
                function: name.to_string(),
                expected,
                found,
            });
        }

        let mut types = Vec::with_capacity(found);
        for arg in &agg.args {
            types.push(self.analyze(ctx, arg, Clause::Argument)?);
        }
        if let Some(window) = &agg.window {
            for expr in &window.partition_by {
                self.analyze(ctx, expr, Clause::Window)?;
            }
            let mut order_types = Vec::with_capacity(window.order_by.len());
            for term in &window.order_by {
                order_types.push(self.analyze(ctx, &term.expr, Clause::Window)?);
            }
            if let Some(frame) = window.frame {
                validate_frame(frame, &order_types)?;
            }
        }
        Ok(aggregate_type(agg.func, types.first().copied().flatten()))
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    pub(crate) fn render_conjuncts(
        &self,
        ctx: &Ctx<'_, '_>,
        conjuncts: &[Expr],
        clause: Clause,
        w: &mut Writer,
    ) -> Result<()> {
        for (i, expr) in conjuncts.iter().enumerate() {
            if i > 0 {
                w.push(" AND ");
            }
            self.render_operand(ctx, expr, None, precedence(ctx, expr) <= BinaryOp::And.precedence(), clause, w)?;
        }
        Ok(())
    }

    fn render_order_term(&self, ctx: &Ctx<'_, '_>, term: &OrderTerm, clause: Clause, w: &mut Writer) -> Result<()> {
        self.render_expr(ctx, &term.expr, clause, w)?;
        if term.desc {
            w.push(" DESC");
        }
        Ok(())
    }

    /// Renders an operand, binding literals compared against `peer` with
    /// the peer column's encoding.
    fn render_operand(
        &self,
        ctx: &Ctx<'_, '_>,
        expr: &Expr,
        peer: Option<&Expr>,
        parens: bool,
        clause: Clause,
        w: &mut Writer,
    ) -> Result<()> {
        if let (Expr::Literal(value), Some(peer)) = (expr, peer) {
            w.bind(literal_bind(ctx, peer, value)?);
            return Ok(());
        }
        if parens {
            w.push("(");
            self.render_expr(ctx, expr, clause, w)?;
            w.push(")");
        } else {
            self.render_expr(ctx, expr, clause, w)?;
        }
        Ok(())
    }

    pub(crate) fn render_expr(&self, ctx: &Ctx<'_, '_>, expr: &Expr, clause: Clause, w: &mut Writer) -> Result<()> {
        match expr {
            Expr::Column(column) => w.column(column),
            Expr::Alias(name) => {
                if clause == Clause::OrderBy {
                    w.ident(name);
                } else {
                    let target = ctx
                        .output(name)
                        .ok_or_else(|| CompileError::UnknownAlias(name.clone()))?;
                    self.render_expr(ctx, target, Clause::Select, w)?;
                }
            }
            Expr::Literal(value) => w.bind(encode(value)),
            Expr::Call { func, args } => {
                w.push(func.sql_name());
                w.push("(");
                w.list(args, |w, a| self.render_expr(ctx, a, clause, w))?;
                w.push(")");
            }
            Expr::Cast { expr, ty } => {
                w.push("CAST(");
                self.render_expr(ctx, expr, clause, w)?;
                w.push(" AS ");
                w.push(sql_type(*ty));
                w.push(")");
            }
            Expr::Binary { op, left, right } => {
                let p = op.precedence();
                let compare = compares(*op);
                let right_prec = precedence(ctx, right);
                let right_parens = right_prec < p || (right_prec == p && !matches!(op, BinaryOp::And | BinaryOp::Or));
                self.render_operand(ctx, left, compare.then_some(&**right), precedence(ctx, left) < p, clause, w)?;
                w.push(" ");
                w.push(op.as_sql());
                w.push(" ");
                self.render_operand(ctx, right, compare.then_some(&**left), right_parens, clause, w)?;
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => {
                    w.push("NOT ");
                    self.render_operand(ctx, expr, None, precedence(ctx, expr) < 3, clause, w)?;
                }
                UnaryOp::Neg => {
                    w.push("-");
                    self.render_operand(ctx, expr, None, precedence(ctx, expr) < ATOM, clause, w)?;
                }
            },
            Expr::IsNull { expr, negated } => {
                self.render_operand(ctx, expr, None, precedence(ctx, expr) < 5, clause, w)?;
                w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::InList { expr, list, negated } => {
                self.render_operand(ctx, expr, None, precedence(ctx, expr) < 5, clause, w)?;
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                w.list(list, |w, item| self.render_operand(ctx, item, Some(expr.as_ref()), false, clause, w))?;
                w.push(")");
            }
            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                self.render_operand(ctx, expr, None, precedence(ctx, expr) < 5, clause, w)?;
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                self.render_subquery_body(subquery, ctx.ctes, w)?;
                w.push(")");
            }
            Expr::Exists { subquery, negated } => {
                w.push(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                self.render_subquery_body(subquery, ctx.ctes, w)?;
                w.push(")");
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.render_operand(ctx, expr, None, precedence(ctx, expr) < 5, clause, w)?;
                w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.render_operand(ctx, low, Some(expr.as_ref()), precedence(ctx, low) < 5, clause, w)?;
                w.push(" AND ");
                self.render_operand(ctx, high, Some(expr.as_ref()), precedence(ctx, high) < 5, clause, w)?;
            }
            Expr::Aggregate(agg) => self.render_aggregate(ctx, agg, w)?,
            Expr::Case {
                branches,
                otherwise,
            } => {
                w.push("CASE");
                for (cond, then) in branches {
                    w.push(" WHEN ");
                    self.render_expr(ctx, cond, clause, w)?;
                    w.push(" THEN ");
                    self.render_expr(ctx, then, clause, w)?;
                }
                if let Some(otherwise) = otherwise {
                    w.push(" ELSE ");
                    self.render_expr(ctx, otherwise, clause, w)?;
                }
                w.push(" END");
            }
            Expr::Subquery(subquery) => {
                w.push("(");
                self.render_subquery_body(subquery, ctx.ctes, w)?;
                w.push(")");
            }
            Expr::Match { table, query } => {
                let pattern = crate::fts::compile_match(query, match_table(ctx, table)?)?;
                w.ident(table);
                w.push(" MATCH ");
                w.bind(SqlValue::Text(pattern));
            }
        }
        Ok(())
    }

    fn render_aggregate(&self, ctx: &Ctx<'_, '_>, agg: &Aggregate, w: &mut Writer) -> Result<()> {
        w.push(agg.func.sql_name());
        w.push("(");
        if agg.func == AggregateFn::CountAll {
            w.push("*");
        } else {
            if agg.distinct {
                w.push("DISTINCT ");
            }
            w.list(&agg.args, |w, a| self.render_expr(ctx, a, Clause::Argument, w))?;
        }
        w.push(")");

        let Some(window) = &agg.window else {
            return Ok(());
        };
        let mut spaced = false;
        w.push(" OVER (");
        if !window.partition_by.is_empty() {
            spaced = true;
            w.push("PARTITION BY ");
            w.list(&window.partition_by, |w, e| self.render_expr(ctx, e, Clause::Window, w))?;
        }
        if !window.order_by.is_empty() {
            if spaced {
                w.push(" ");
            }
            spaced = true;
            w.push("ORDER BY ");
            w.list(&window.order_by, |w, t| self.render_order_term(ctx, t, Clause::Window, w))?;
        }
        let frame = window
            .frame
            .or_else(|| (agg.func.uses_frame() && !window.order_by.is_empty()).then(Frame::standard));
        if let Some(frame) = frame {
            if spaced {
                w.push(" ");
            }
            render_frame(frame, w);
        }
        w.push(")");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Splits filters into WHERE and HAVING conjuncts.
fn route_filters(ctx: &Ctx<'_, '_>, query: &Query) -> Result<(Vec<Expr>, Vec<Expr>)> {
    let mut wheres = Vec::new();
    let mut havings = Vec::new();
    for filter in &query.filters {
        for conjunct in filter.clone().into_conjuncts() {
            let (aggregate, window) = ctx.inspect(&conjunct);
            if window {
                return Err(CompileError::MisplacedAggregate(
                    "window function in a filter".into(),
                ));
            }
            if aggregate {
                havings.push(conjunct);
            } else {
                wheres.push(conjunct);
            }
        }
    }
    havings.extend(query.having.iter().cloned());
    Ok((wheres, havings))
}

const fn compares(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Is
            | BinaryOp::IsNot
    )
}

fn precedence(ctx: &Ctx<'_, '_>, expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Alias(name) => match ctx.output(name) {
            Some(target) if !matches!(target, Expr::Alias(_)) => precedence(ctx, target),
            _ => ATOM,
        },
        Expr::Unary {
            op: UnaryOp::Not, ..
        }
        | Expr::Exists { negated: true, .. } => 3,
        Expr::IsNull { .. }
        | Expr::InList { .. }
        | Expr::InSubquery { .. }
        | Expr::Between { .. }
        | Expr::Match { .. } => 4,
        Expr::Unary {
            op: UnaryOp::Neg, ..
        } => 9,
        _ => ATOM,
    }
}

/// The column an operand stands for, looking through output aliases.
fn column_of<'e>(ctx: &Ctx<'e, '_>, expr: &'e Expr) -> Option<&'e ColumnRef> {
    match expr {
        Expr::Column(column) => Some(column),
        Expr::Alias(name) => match ctx.output(name) {
            Some(Expr::Column(column)) => Some(column),
            _ => None,
        },
        _ => None,
    }
}

fn check_literal(ctx: &Ctx<'_, '_>, target: &Expr, other: &Expr) -> Result<()> {
    if let Expr::Literal(value) = other {
        literal_bind(ctx, target, value)?;
    }
    Ok(())
}

/// Encodes a literal compared against `peer`, using the peer column's
/// type when it is one.
fn literal_bind(ctx: &Ctx<'_, '_>, peer: &Expr, value: &Value) -> Result<SqlValue> {
    let Some(column) = column_of(ctx, peer) else {
        return Ok(encode(value));
    };
    let ty = ctx.scope.column_type(column)?;
    if let (Value::Real(_), ColumnType::Integer) = (value, ty) {
        return Ok(encode(value));
    }
    encode_for(&format!("{}.{}", column.source, column.column), value, ty)
}

fn match_table<'c>(ctx: &Ctx<'_, 'c>, table: &str) -> Result<&'c TableDescriptor> {
    let source = ctx
        .scope
        .source(table)
        .ok_or_else(|| CompileError::UnknownTable(table.to_string()))?;
    source
        .table()
        .filter(|t| t.is_full_text())
        .ok_or_else(|| CompileError::NotFullText(table.to_string()))
}

const fn binary_type(op: BinaryOp, left: Option<ColumnType>, right: Option<ColumnType>) -> Option<ColumnType> {
    match op {
        BinaryOp::Concat => Some(ColumnType::Text),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (left, right) {
            (None, None) => None,
            (
                Some(ColumnType::Integer | ColumnType::Boolean) | None,
                Some(ColumnType::Integer | ColumnType::Boolean) | None,
            ) => Some(ColumnType::Integer),
            _ => Some(ColumnType::Real),
        },
        _ => Some(ColumnType::Boolean),
    }
}

const fn aggregate_type(func: AggregateFn, arg: Option<ColumnType>) -> Option<ColumnType> {
    match func {
        AggregateFn::Count
        | AggregateFn::CountAll
        | AggregateFn::RowNumber
        | AggregateFn::Rank
        | AggregateFn::DenseRank
        | AggregateFn::Ntile => Some(ColumnType::Integer),
        AggregateFn::Avg | AggregateFn::Total | AggregateFn::PercentRank | AggregateFn::CumeDist => {
            Some(ColumnType::Real)
        }
        AggregateFn::Sum => match arg {
            Some(ColumnType::Integer | ColumnType::Boolean) => Some(ColumnType::Integer),
            _ => Some(ColumnType::Real),
        },
        AggregateFn::GroupConcat => Some(ColumnType::Text),
        AggregateFn::Min
        | AggregateFn::Max
        | AggregateFn::FirstValue
        | AggregateFn::LastValue
        | AggregateFn::NthValue
        | AggregateFn::Lag
        | AggregateFn::Lead => arg,
    }
}

fn validate_frame(frame: Frame, order_types: &[Option<ColumnType>]) -> Result<()> {
    if frame.start == FrameBound::UnboundedFollowing {
        return Err(CompileError::InvalidFrame(
            "frame cannot start at UNBOUNDED FOLLOWING".into(),
        ));
    }
    if frame.end == FrameBound::UnboundedPreceding {
        return Err(CompileError::InvalidFrame(
            "frame cannot end at UNBOUNDED PRECEDING".into(),
        ));
    }
    let reversed = match (frame.start, frame.end) {
        (FrameBound::Preceding(start), FrameBound::Preceding(end)) => start < end,
        (FrameBound::Following(start), FrameBound::Following(end)) => start > end,
        (start, end) => start.position() > end.position(),
    };
    if reversed {
        return Err(CompileError::InvalidFrame("frame starts after it ends".into()));
    }
    for bound in [frame.start, frame.end] {
        if let Some(offset) = bound.offset() {
            if i64::try_from(offset).is_err() {
                return Err(CompileError::InvalidFrame(format!("offset {offset} is out of range")));
            }
        }
    }
    let has_offset = frame.start.offset().is_some() || frame.end.offset().is_some();
    if frame.mode == FrameMode::Range && has_offset {
        match order_types {
            [Some(ty)] if ty.is_numeric() => {}
            _ => {
                return Err(CompileError::InvalidFrame(
                    "RANGE with an offset needs exactly one numeric ORDER BY term".into(),
                ))
            }
        }
    }
    Ok(())
}

fn render_frame(frame: Frame, w: &mut Writer) {
    w.push(match frame.mode {
        FrameMode::Rows => "ROWS BETWEEN ",
        FrameMode::Range => "RANGE BETWEEN ",
    });
    render_bound(frame.start, w);
    w.push(" AND ");
    render_bound(frame.end, w);
}

fn render_bound(bound: FrameBound, w: &mut Writer) {
    match bound {
        FrameBound::UnboundedPreceding => w.push("UNBOUNDED PRECEDING"),
        FrameBound::Preceding(n) => {
            w.bind(SqlValue::Int(clamp(n)));
            w.push(" PRECEDING");
        }
        FrameBound::CurrentRow => w.push("CURRENT ROW"),
        FrameBound::Following(n) => {
            w.bind(SqlValue::Int(clamp(n)));
            w.push(" FOLLOWING");
        }
        FrameBound::UnboundedFollowing => w.push("UNBOUNDED FOLLOWING"),
    }
}

fn render_limit(limit: Option<u64>, offset: Option<u64>, w: &mut Writer) {
    if limit.is_none() && offset.is_none() {
        return;
    }
    w.push(" LIMIT ");
    w.bind(SqlValue::Int(limit.map_or(-1, clamp)));
    if let Some(offset) = offset {
        w.push(" OFFSET ");
        w.bind(SqlValue::Int(clamp(offset)));
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
