//! Standard-mode SQL compiler.
//!
//! Assembles pre-aggregation CTEs, the primary-cube FROM clause, resolved
//! joins, the partitioned filter tree, grouping, ordering, and the row cap
//! into one parameterized statement. Time dimensions with a granularity are
//! truncated at compile time through the dialect.

use std::collections::{HashMap, HashSet};

use crate::error::{CompileError, CompileResult};
use crate::planner::{plan_query, PreAggregation, QueryAnalysis, QueryPlan, StructuralSummary};
use crate::query::{Query as QueryRequest, SortDirection, TimeDimension};
use crate::schema::{Aggregation, Schema};
use crate::sql::expr::{
    avg, col, count, count_distinct, count_star, lit_int, max, min, nullif, sum, table_col, Expr,
    ExprExt, WindowExt, WindowFrame, WindowOrderBy,
};
use crate::sql::query::SelectExpr;
use crate::sql::{Cte, Dialect, ParamBinder, Query};

use super::common::{cube_alias, member_alias, table_ref_for, time_member_alias, truncate};
use super::filters::{
    compile_filter, date_range_condition, partition_filters, PartitionedFilters,
};
use super::CompiledQuery;

/// Compile a standard query against the primary date ranges.
pub fn compile_standard(
    schema: &Schema,
    request: &QueryRequest,
    dialect: Dialect,
) -> CompileResult<CompiledQuery> {
    if request.measures.is_empty()
        && request.dimensions.is_empty()
        && request.time_dimensions.is_empty()
    {
        return Err(CompileError::IncompleteSpec(
            "query requests no measures or dimensions".into(),
        ));
    }

    let plan = plan_query(schema, request)?;
    let assembled = assemble(schema, request, &plan, dialect)?;
    Ok(assembled)
}

/// Compile one variant per comparison date range.
///
/// Each variant replaces the date range of the first time dimension that
/// declares `compareDateRange`; an empty vector means no comparison was
/// requested.
pub fn compile_compare_ranges(
    schema: &Schema,
    request: &QueryRequest,
    dialect: Dialect,
) -> CompileResult<Vec<CompiledQuery>> {
    let Some((index, time_dimension)) = request
        .time_dimensions
        .iter()
        .enumerate()
        .find(|(_, t)| !t.compare_date_range.is_empty())
    else {
        return Ok(Vec::new());
    };

    let mut variants = Vec::new();
    for range in &time_dimension.compare_date_range {
        let mut variant = request.clone();
        variant.time_dimensions[index] = TimeDimension {
            date_range: Some(range.clone()),
            compare_date_range: Vec::new(),
            ..time_dimension.clone()
        };
        variants.push(compile_standard(schema, &variant, dialect)?);
    }
    Ok(variants)
}

fn assemble(
    schema: &Schema,
    request: &QueryRequest,
    plan: &QueryPlan,
    dialect: Dialect,
) -> CompileResult<CompiledQuery> {
    let preagg_cubes: HashSet<String> = plan
        .pre_aggregations
        .iter()
        .map(|p| p.cube.clone())
        .collect();

    let parts = match &request.filters {
        Some(filters) => partition_filters(schema, filters, &preagg_cubes)?,
        None => PartitionedFilters::default(),
    };

    let mut binder = ParamBinder::new();

    // Pre-aggregation CTEs come first in the statement, so their parameters
    // bind first; placeholder order must match textual order for `?`-style
    // dialects.
    let mut ctes: Vec<Cte> = Vec::new();
    for preagg in &plan.pre_aggregations {
        ctes.push(build_preagg_cte(
            schema,
            request,
            preagg,
            parts.per_cube.get(&preagg.cube),
            dialect,
            &mut binder,
        )?);
    }

    // ---------------------------------------------------------------------
    // Select list: dimensions, time dimensions, then measures.
    // ---------------------------------------------------------------------
    let mut select_items: Vec<SelectExpr> = Vec::new();
    let mut group_exprs: Vec<Expr> = Vec::new();
    let mut output_aliases: HashMap<String, String> = HashMap::new();

    for member in &request.dimensions {
        let (cube, dimension) = schema.resolve_dimension(member)?;
        let alias = member_alias(member)?;
        let expr = if let Some(preagg) = plan.pre_aggregation_for(&cube.name) {
            table_col(&preagg.alias, &alias)
        } else {
            table_col(&cube_alias(&cube.name), dimension.source_column())
        };
        select_items.push(SelectExpr::new(expr.clone()).with_alias(&alias));
        group_exprs.push(expr);
        output_aliases.insert(member.clone(), alias);
    }

    let mut first_time_expr: Option<Expr> = None;
    for time_dimension in &request.time_dimensions {
        let member = &time_dimension.dimension;
        let (cube, dimension) = schema.resolve_dimension(member)?;
        let (alias, expr) = match (&time_dimension.granularity, plan.pre_aggregation_for(&cube.name)) {
            (Some(granularity), Some(preagg)) => {
                let alias = time_member_alias(member, granularity.as_sql())?;
                (alias.clone(), table_col(&preagg.alias, &alias))
            }
            (Some(granularity), None) => {
                let raw = table_col(&cube_alias(&cube.name), dimension.source_column());
                (
                    time_member_alias(member, granularity.as_sql())?,
                    truncate(dialect, *granularity, raw),
                )
            }
            (None, Some(preagg)) => {
                let alias = member_alias(member)?;
                (alias.clone(), table_col(&preagg.alias, &alias))
            }
            (None, None) => (
                member_alias(member)?,
                table_col(&cube_alias(&cube.name), dimension.source_column()),
            ),
        };
        select_items.push(SelectExpr::new(expr.clone()).with_alias(&alias));
        group_exprs.push(expr.clone());
        output_aliases.insert(member.clone(), alias);
        first_time_expr.get_or_insert(expr);
    }

    let mut has_aggregates = !plan.pre_aggregations.is_empty();
    let mut plain_measure_exprs: Vec<Expr> = Vec::new();
    for member in &request.measures {
        let alias = member_alias(member)?;
        let expr = measure_expr(schema, plan, member, first_time_expr.as_ref())?;
        if is_aggregate_expr(schema, plan, member)? {
            has_aggregates = true;
        } else {
            plain_measure_exprs.push(expr.clone());
        }
        select_items.push(SelectExpr::new(expr).with_alias(&alias));
        output_aliases.insert(member.clone(), alias);
    }

    // ---------------------------------------------------------------------
    // Outer statement.
    // ---------------------------------------------------------------------
    let primary_cube = schema
        .cube(&plan.primary.cube)
        .ok_or_else(|| CompileError::UnknownMember(plan.primary.cube.clone()))?;

    let mut outer = Query::new();
    for cte in ctes {
        outer = outer.with_cte(cte);
    }
    outer = outer.select(select_items).from(table_ref_for(primary_cube));

    let cte_for = |cube: &str| -> Option<String> {
        plan.pre_aggregation_for(cube).map(|p| p.alias.clone())
    };
    let (mut outer, join_steps) =
        super::common::append_path_joins(outer, schema, &plan.paths, &cte_for)?;

    // WHERE: partitioned dimension filters, then time-dimension ranges.
    let resolver = outer_member_resolver(schema, plan, first_time_expr.clone());
    for node in &parts.outer {
        let predicate = compile_filter(schema, dialect, node, &mut binder, &resolver)?;
        outer = outer.filter(predicate);
    }
    for time_dimension in &request.time_dimensions {
        let Some(range) = &time_dimension.date_range else {
            continue;
        };
        let member = &time_dimension.dimension;
        let (cube, dimension) = schema.resolve_dimension(member)?;
        if preagg_cubes.contains(&cube.name) {
            // Applied inside that cube's CTE.
            continue;
        }
        let raw = table_col(&cube_alias(&cube.name), dimension.source_column());
        outer = outer.filter(date_range_condition(dialect, member, raw, range, &mut binder)?);
    }

    // GROUP BY all requested dimensions when any measure aggregates;
    // unaggregated measures must then be grouped as well.
    if has_aggregates && !group_exprs.is_empty() {
        let mut groups = group_exprs;
        groups.extend(plain_measure_exprs);
        outer = outer.group_by(groups);
    }

    // HAVING: measure filters, ANDed.
    for node in &parts.having {
        let predicate = compile_filter(schema, dialect, node, &mut binder, &resolver)?;
        outer = match outer.having.take() {
            Some(existing) => outer.having(existing.and(predicate)),
            None => outer.having(predicate),
        };
    }

    // ORDER BY requested fields through their output aliases.
    let mut order_exprs = Vec::new();
    for (field, direction) in &request.order {
        let alias = output_aliases
            .get(field)
            .ok_or_else(|| CompileError::UnknownMember(format!("order field '{field}'")))?;
        order_exprs.push(match direction {
            SortDirection::Asc => crate::sql::OrderByExpr::asc(col(alias)),
            SortDirection::Desc => crate::sql::OrderByExpr::desc(col(alias)),
        });
    }
    if !order_exprs.is_empty() {
        outer = outer.order_by(order_exprs);
    }

    if let Some(limit) = request.limit {
        outer = outer.limit(limit);
    }

    let analysis = QueryAnalysis {
        primary_cube: plan.primary.cube.clone(),
        selection_reason: plan.primary.reason,
        candidates: plan.primary.candidates.clone(),
        join_paths: plan.paths.clone(),
        pre_aggregations: plan.pre_aggregations.clone(),
        summary: StructuralSummary {
            cube_count: plan.paths.len() + 1,
            join_count: join_steps,
            cte_count: plan.pre_aggregations.len(),
        },
    };

    Ok(CompiledQuery {
        sql: outer.to_sql(dialect),
        params: binder.into_values(),
        analysis,
    })
}

/// Build the pre-aggregation CTE for one cube: join keys + that cube's
/// requested dimensions + measure partials, filtered and grouped before the
/// outer join can fan rows out.
fn build_preagg_cte(
    schema: &Schema,
    request: &QueryRequest,
    preagg: &PreAggregation,
    cube_filters: Option<&Vec<crate::query::FilterNode>>,
    dialect: Dialect,
    binder: &mut ParamBinder,
) -> CompileResult<Cte> {
    let cube = schema
        .cube(&preagg.cube)
        .ok_or_else(|| CompileError::UnknownMember(preagg.cube.clone()))?;
    let alias = cube_alias(&cube.name);

    let mut select_items: Vec<SelectExpr> = Vec::new();
    let mut group_exprs: Vec<Expr> = Vec::new();

    for key in &preagg.join_keys {
        let expr = table_col(&alias, key);
        select_items.push(SelectExpr::new(expr.clone()).with_alias(key));
        group_exprs.push(expr);
    }

    for member in &request.dimensions {
        let (dim_cube, dimension) = schema.resolve_dimension(member)?;
        if dim_cube.name != cube.name {
            continue;
        }
        let expr = table_col(&alias, dimension.source_column());
        select_items.push(SelectExpr::new(expr.clone()).with_alias(&member_alias(member)?));
        group_exprs.push(expr);
    }

    for time_dimension in &request.time_dimensions {
        let member = &time_dimension.dimension;
        let (dim_cube, dimension) = schema.resolve_dimension(member)?;
        if dim_cube.name != cube.name {
            continue;
        }
        let raw = table_col(&alias, dimension.source_column());
        let (out_alias, expr) = match &time_dimension.granularity {
            Some(granularity) => (
                time_member_alias(member, granularity.as_sql())?,
                truncate(dialect, *granularity, raw),
            ),
            None => (member_alias(member)?, raw),
        };
        select_items.push(SelectExpr::new(expr.clone()).with_alias(&out_alias));
        group_exprs.push(expr);
    }

    for member in &preagg.measures {
        let (_, measure) = schema.resolve_measure(member)?;
        let out_alias = member_alias(member)?;
        match measure.aggregation {
            Aggregation::Avg => {
                let column = required_column(measure.column.as_deref(), member)?;
                select_items.push(
                    sum(table_col(&alias, column)).alias(&format!("{out_alias}_sum")),
                );
                select_items.push(
                    count(table_col(&alias, column)).alias(&format!("{out_alias}_count")),
                );
            }
            _ => {
                let partial = partial_expr(measure, member, &alias)?;
                select_items.push(SelectExpr::new(partial).with_alias(&out_alias));
            }
        }
    }

    let mut cte_query = Query::new().select(select_items).from(table_ref_for(cube));

    let member_expr = cte_member_resolver(schema, &alias);
    if let Some(filters) = cube_filters {
        for node in filters {
            let predicate = compile_filter(schema, dialect, node, binder, &member_expr)?;
            cte_query = cte_query.filter(predicate);
        }
    }
    for time_dimension in &request.time_dimensions {
        let member = &time_dimension.dimension;
        let (dim_cube, dimension) = schema.resolve_dimension(member)?;
        if dim_cube.name != cube.name {
            continue;
        }
        if let Some(range) = &time_dimension.date_range {
            let raw = table_col(&alias, dimension.source_column());
            cte_query =
                cte_query.filter(date_range_condition(dialect, member, raw, range, binder)?);
        }
    }

    cte_query = cte_query.group_by(group_exprs);
    Ok(Cte::new(&preagg.alias, cte_query))
}

/// Per-key partial aggregate inside a pre-aggregation CTE.
fn partial_expr(
    measure: &crate::schema::Measure,
    member: &str,
    alias: &str,
) -> CompileResult<Expr> {
    Ok(match measure.aggregation {
        Aggregation::Count => match &measure.column {
            Some(column) => count(table_col(alias, column)),
            None => count_star(),
        },
        Aggregation::CountDistinct => {
            count_distinct(table_col(alias, required_column(measure.column.as_deref(), member)?))
        }
        Aggregation::Sum | Aggregation::RunningTotal => {
            sum(table_col(alias, required_column(measure.column.as_deref(), member)?))
        }
        Aggregation::Min => {
            min(table_col(alias, required_column(measure.column.as_deref(), member)?))
        }
        Aggregation::Max | Aggregation::Calculated | Aggregation::Number => {
            max(table_col(alias, required_column(measure.column.as_deref(), member)?))
        }
        Aggregation::Avg => unreachable!("avg partials are emitted as sum and count"),
    })
}

/// Outer select expression for a measure, re-aggregating pre-aggregation
/// partials where a CTE was planned.
fn measure_expr(
    schema: &Schema,
    plan: &QueryPlan,
    member: &str,
    time_order: Option<&Expr>,
) -> CompileResult<Expr> {
    let (cube, measure) = schema.resolve_measure(member)?;
    let out_alias = member_alias(member)?;

    if let Some(preagg) = plan.pre_aggregation_for(&cube.name) {
        let agg = &preagg.alias;
        return Ok(match measure.aggregation {
            Aggregation::Sum | Aggregation::Count | Aggregation::CountDistinct => {
                sum(table_col(agg, &out_alias))
            }
            Aggregation::RunningTotal => {
                running_total(sum(table_col(agg, &out_alias)), time_order)
            }
            Aggregation::Min => min(table_col(agg, &out_alias)),
            Aggregation::Max | Aggregation::Calculated | Aggregation::Number => {
                max(table_col(agg, &out_alias))
            }
            Aggregation::Avg => sum(table_col(agg, &format!("{out_alias}_sum"))).div(nullif(
                sum(table_col(agg, &format!("{out_alias}_count"))),
                lit_int(0),
            )),
        });
    }

    let alias = cube_alias(&cube.name);
    Ok(match measure.aggregation {
        Aggregation::Count => match &measure.column {
            Some(column) => count(table_col(&alias, column)),
            None => count_star(),
        },
        Aggregation::CountDistinct => count_distinct(table_col(
            &alias,
            required_column(measure.column.as_deref(), member)?,
        )),
        Aggregation::Sum => sum(table_col(
            &alias,
            required_column(measure.column.as_deref(), member)?,
        )),
        Aggregation::Avg => avg(table_col(
            &alias,
            required_column(measure.column.as_deref(), member)?,
        )),
        Aggregation::Min => min(table_col(
            &alias,
            required_column(measure.column.as_deref(), member)?,
        )),
        Aggregation::Max => max(table_col(
            &alias,
            required_column(measure.column.as_deref(), member)?,
        )),
        Aggregation::RunningTotal => running_total(
            sum(table_col(
                &alias,
                required_column(measure.column.as_deref(), member)?,
            )),
            time_order,
        ),
        Aggregation::Calculated | Aggregation::Number => table_col(
            &alias,
            required_column(measure.column.as_deref(), member)?,
        ),
    })
}

/// Whether a measure's outer expression aggregates.
fn is_aggregate_expr(schema: &Schema, plan: &QueryPlan, member: &str) -> CompileResult<bool> {
    let (cube, measure) = schema.resolve_measure(member)?;
    if plan.pre_aggregation_for(&cube.name).is_some() {
        return Ok(true);
    }
    Ok(measure.aggregation.is_aggregate())
}

/// Cumulative SUM over the query's leading time bucket.
fn running_total(inner: Expr, time_order: Option<&Expr>) -> Expr {
    match time_order {
        Some(order) => inner
            .over()
            .order_by(vec![WindowOrderBy::asc(order.clone())])
            .frame(WindowFrame::rows_to_current())
            .build(),
        None => inner,
    }
}

fn required_column<'a>(column: Option<&'a str>, member: &str) -> CompileResult<&'a str> {
    column.ok_or_else(|| {
        CompileError::IncompleteSpec(format!(
            "measure '{member}' requires a source column for its aggregation"
        ))
    })
}

/// Member resolver for the outer scope: dimensions address their cube alias
/// (or CTE column), measures expand to their outer aggregate expression.
fn outer_member_resolver<'a>(
    schema: &'a Schema,
    plan: &'a QueryPlan,
    first_time_expr: Option<Expr>,
) -> impl Fn(&str) -> CompileResult<Expr> + 'a {
    move |member: &str| match schema.resolve(member)? {
        crate::schema::ResolvedMember::Dimension { cube, dimension } => {
            if let Some(preagg) = plan.pre_aggregation_for(&cube.name) {
                Ok(table_col(&preagg.alias, &member_alias(member)?))
            } else {
                Ok(table_col(&cube_alias(&cube.name), dimension.source_column()))
            }
        }
        crate::schema::ResolvedMember::Measure { .. } => {
            measure_expr(schema, plan, member, first_time_expr.as_ref())
        }
    }
}

/// Member resolver inside a pre-aggregation CTE: plain columns of that cube.
fn cte_member_resolver<'a>(
    schema: &'a Schema,
    alias: &str,
) -> impl Fn(&str) -> CompileResult<Expr> + 'a {
    let alias = alias.to_string();
    move |member: &str| match schema.resolve(member)? {
        crate::schema::ResolvedMember::Dimension { dimension, .. } => {
            Ok(table_col(&alias, dimension.source_column()))
        }
        crate::schema::ResolvedMember::Measure { .. } => Err(CompileError::IncompleteSpec(
            format!("measure '{member}' cannot be filtered inside a pre-aggregation"),
        )),
    }
}
