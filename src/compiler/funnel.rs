//! Funnel compiler - one CTE per step, correlated by the binding key.
//!
//! Step 0 selects qualifying entities and their first event time. Every
//! later step joins the previous step's CTE (the implicit membership
//! filter) and bounds elapsed time by the step's conversion window. The
//! final SELECT unions per-step counts and derives conversion ratios
//! against step 0.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompileError, CompileResult};
use crate::planner::path::find_path;
use crate::query::{FilterNode, FunnelRequest};
use crate::schema::graph::SchemaGraph;
use crate::schema::{Cube, Dimension, Schema, ValueType};
use crate::sql::expr::{
    col, count_star, first_value, lit_float, lit_int, min, nullif, table_col, Expr, ExprExt,
    WindowExt, WindowOrderBy,
};
use crate::sql::query::SelectExpr;
use crate::sql::{Cte, Dialect, OrderByExpr, ParamBinder, Query, SqlDialect, TableRef};

use super::common::{append_path_joins, cube_alias, table_ref_for};
use super::filters::compile_filter;

/// Compiled funnel: one statement plus per-step metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelCompiled {
    pub sql: String,
    pub params: Vec<Value>,
    pub funnel_metadata: FunnelMetadata,
}

/// Funnel-wide metadata for debug panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelMetadata {
    pub binding_key: String,
    pub time_dimension: String,
    pub steps: Vec<FunnelStepMeta>,
}

/// One step's executed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepMeta {
    pub index: usize,
    pub name: String,
    pub cube: String,
    /// Maximum elapsed seconds from the previous step, None = unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    /// Debug view of the per-step query. Includes the membership join
    /// against the previous step's CTE, which is implicit in the request.
    pub sql: String,
}

pub fn compile_funnel(
    schema: &Schema,
    request: &FunnelRequest,
    dialect: Dialect,
) -> CompileResult<FunnelCompiled> {
    if request.steps.is_empty() {
        return Err(CompileError::IncompleteSpec(
            "funnel requires at least one step".into(),
        ));
    }
    if request.steps[0].time_to_convert.is_some() {
        return Err(CompileError::IncompleteSpec(
            "funnel step 0 cannot declare timeToConvert".into(),
        ));
    }

    let (binding_cube, binding_dim) = schema.resolve_dimension(&request.binding_key)?;
    let (time_cube, time_dim) = schema.resolve_dimension(&request.time_dimension)?;
    if time_dim.value_type != ValueType::Time {
        return Err(CompileError::IncompleteSpec(format!(
            "'{}' cannot be used as a funnel time dimension",
            request.time_dimension
        )));
    }

    let graph = SchemaGraph::new(schema);
    let mut binder = ParamBinder::new();
    let mut ctes: Vec<Cte> = Vec::new();
    let mut step_metas: Vec<FunnelStepMeta> = Vec::new();

    for (index, step) in request.steps.iter().enumerate() {
        let step_cube = schema
            .cube(&step.cube)
            .ok_or_else(|| CompileError::UnknownMember(step.cube.clone()))?;
        let window_seconds = step.time_to_convert.as_ref().map(|w| w.seconds());

        let cte_query = build_step_query(
            schema,
            &graph,
            step_cube,
            step.filters.as_ref(),
            index,
            window_seconds,
            (binding_cube, binding_dim),
            (time_cube, time_dim),
            dialect,
            &mut binder,
        )?;

        step_metas.push(FunnelStepMeta {
            index,
            name: step.label(index),
            cube: step.cube.clone(),
            window_seconds,
            sql: cte_query.to_sql(dialect),
        });
        ctes.push(Cte::new(&format!("step_{index}"), cte_query));
    }

    // Per-step counts, unioned in step order; names travel as parameters.
    let mut count_queries: Vec<Query> = Vec::new();
    for meta in &step_metas {
        let name_param = binder.bind(Value::String(meta.name.clone()));
        count_queries.push(
            Query::new()
                .select(vec![
                    lit_int(meta.index as i64).alias("step_index"),
                    name_param.alias("step_name"),
                    count_star().alias("entities"),
                ])
                .from(TableRef::new(&format!("step_{}", meta.index))),
        );
    }

    let first_count = first_value(col("entities"))
        .over()
        .order_by(vec![WindowOrderBy::asc(col("step_index"))])
        .build();
    let conversion = col("entities")
        .mul(lit_float(1.0))
        .div(nullif(first_count, lit_int(0)));

    let mut outer = Query::new();
    for cte in ctes {
        outer = outer.with_cte(cte);
    }
    outer = outer
        .with_cte(Cte::new("funnel_steps", Query::union_all(count_queries)))
        .select(vec![
            SelectExpr::new(col("step_index")),
            SelectExpr::new(col("step_name")),
            SelectExpr::new(col("entities")),
            conversion.alias("conversion"),
        ])
        .from(TableRef::new("funnel_steps"))
        .order_by(vec![OrderByExpr::asc(col("step_index"))]);

    Ok(FunnelCompiled {
        sql: outer.to_sql(dialect),
        params: binder.into_values(),
        funnel_metadata: FunnelMetadata {
            binding_key: request.binding_key.clone(),
            time_dimension: request.time_dimension.clone(),
            steps: step_metas,
        },
    })
}

/// Build the SELECT for one step: qualifying entities and their first
/// qualifying event time, joined to the previous step when index > 0.
#[allow(clippy::too_many_arguments)]
fn build_step_query(
    schema: &Schema,
    graph: &SchemaGraph,
    step_cube: &Cube,
    filters: Option<&FilterNode>,
    index: usize,
    window_seconds: Option<i64>,
    binding: (&Cube, &Dimension),
    time: (&Cube, &Dimension),
    dialect: Dialect,
    binder: &mut ParamBinder,
) -> CompileResult<Query> {
    let (binding_cube, binding_dim) = binding;
    let (time_cube, time_dim) = time;

    // Cubes this step must reach from its own anchor.
    let mut targets: Vec<String> = Vec::new();
    let push_target = |name: &str, targets: &mut Vec<String>| {
        if name != step_cube.name && !targets.iter().any(|t| t == name) {
            targets.push(name.to_string());
        }
    };
    push_target(&binding_cube.name, &mut targets);
    push_target(&time_cube.name, &mut targets);
    if let Some(filters) = filters {
        for member in filters.members() {
            let resolved = schema.resolve(member)?;
            push_target(&resolved.cube().name, &mut targets);
        }
    }
    targets.sort();

    // Every reached cube is required, so all joins are INNER.
    let constrained: HashSet<String> = targets.iter().cloned().collect();
    let mut paths = Vec::new();
    for target in &targets {
        paths.push(find_path(graph, &step_cube.name, target, &constrained)?);
    }

    let binding_expr = table_col(&cube_alias(&binding_cube.name), binding_dim.source_column());
    let time_expr = table_col(&cube_alias(&time_cube.name), time_dim.source_column());

    let query = Query::new()
        .select(vec![
            SelectExpr::new(binding_expr.clone()).with_alias("actor"),
            min(time_expr.clone()).alias("occurred_at"),
        ])
        .from(table_ref_for(step_cube));

    let no_cte = |_: &str| -> Option<String> { None };
    let (mut query, _joins) = append_path_joins(query, schema, &paths, &no_cte)?;

    // Membership join: entities must appear in the previous step's output,
    // with the qualifying event inside the conversion window.
    if index > 0 {
        let prev = format!("step_{}", index - 1);
        query = query.inner_join(
            TableRef::new(&prev).with_alias("prev"),
            binding_expr.clone().eq(table_col("prev", "actor")),
        );
        query = query.filter(time_expr.clone().gte(table_col("prev", "occurred_at")));

        if let Some(seconds) = window_seconds {
            let mut bound = table_col("prev", "occurred_at").to_tokens_for_dialect(dialect);
            bound.space().push(crate::sql::Token::Plus).space();
            bound.append(&dialect.emit_interval(seconds, "second"));
            query = query.filter(time_expr.clone().lte(Expr::Raw(bound.serialize(dialect))));
        }
    }

    if let Some(filters) = filters {
        let resolver = step_member_resolver(schema);
        let predicate = compile_filter(schema, dialect, filters, binder, &resolver)?;
        query = query.filter(predicate);
    }

    Ok(query.group_by(vec![binding_expr]))
}

/// Step-scope member resolver: dimension columns by cube alias; measures
/// have no meaning inside a funnel step.
fn step_member_resolver(schema: &Schema) -> impl Fn(&str) -> CompileResult<Expr> + '_ {
    move |member: &str| match schema.resolve(member)? {
        crate::schema::ResolvedMember::Dimension { cube, dimension } => {
            Ok(table_col(&cube_alias(&cube.name), dimension.source_column()))
        }
        crate::schema::ResolvedMember::Measure { .. } => Err(CompileError::IncompleteSpec(
            format!("measure '{member}' cannot appear in a funnel step filter"),
        )),
    }
}
