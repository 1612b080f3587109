//! Flow compiler - symmetric expansion around a starting event.
//!
//! Layers are ranked per binding key with ROW_NUMBER over event time,
//! ascending after the starting event and descending before it. The output
//! is two statements sharing one CTE prefix: nodes (one row per distinct
//! (layer, event-name) pair) and links (one row per observed transition
//! between consecutive layers). That nodes/links shape is the boundary
//! contract with flow-visualization consumers.

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::query::FlowRequest;
use crate::schema::graph::SchemaGraph;
use crate::schema::{Cube, Schema, ValueType};
use crate::sql::expr::{
    col, count_star, lit_int, min, row_number, table_col, Expr, ExprExt, WindowExt, WindowOrderBy,
};
use crate::sql::query::SelectExpr;
use crate::sql::{Cte, Dialect, OrderByExpr, ParamBinder, Query, TableRef};

use super::common::{append_path_joins, cube_alias, filter_join_paths, table_ref_for};
use super::filters::compile_filter;
use super::CompiledStatement;

/// Compiled flow: the nodes and links statements plus request metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowCompiled {
    pub nodes: CompiledStatement,
    pub links: CompiledStatement,
    pub flow_metadata: FlowMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetadata {
    pub binding_key: String,
    pub event_dimension: String,
    pub time_dimension: String,
    pub steps_before: u32,
    pub steps_after: u32,
}

pub fn compile_flow(
    schema: &Schema,
    request: &FlowRequest,
    dialect: Dialect,
) -> CompileResult<FlowCompiled> {
    let cube = schema
        .cube(&request.cube)
        .ok_or_else(|| CompileError::UnknownMember(request.cube.clone()))?;

    let binding = same_cube_dimension(schema, cube, &request.binding_key, "binding key")?;
    let event = same_cube_dimension(schema, cube, &request.event_dimension, "event dimension")?;
    let time = same_cube_dimension(schema, cube, &request.time_dimension, "time dimension")?;
    let (_, time_dim) = schema.resolve_dimension(&request.time_dimension)?;
    if time_dim.value_type != ValueType::Time {
        return Err(CompileError::IncompleteSpec(format!(
            "'{}' cannot be used as a flow time dimension",
            request.time_dimension
        )));
    }

    // The two statements bind their own parameter arrays; the CTE prefix is
    // identical in both.
    let mut nodes_binder = ParamBinder::new();
    let nodes_sql =
        nodes_statement(schema, request, cube, &binding, &event, &time, dialect, &mut nodes_binder)?;

    let mut links_binder = ParamBinder::new();
    let links_sql =
        links_statement(schema, request, cube, &binding, &event, &time, dialect, &mut links_binder)?;

    Ok(FlowCompiled {
        nodes: CompiledStatement {
            sql: nodes_sql,
            params: nodes_binder.into_values(),
        },
        links: CompiledStatement {
            sql: links_sql,
            params: links_binder.into_values(),
        },
        flow_metadata: FlowMetadata {
            binding_key: request.binding_key.clone(),
            event_dimension: request.event_dimension.clone(),
            time_dimension: request.time_dimension.clone(),
            steps_before: request.steps_before,
            steps_after: request.steps_after,
        },
    })
}

#[allow(clippy::too_many_arguments)]
fn nodes_statement(
    schema: &Schema,
    request: &FlowRequest,
    cube: &Cube,
    binding: &Expr,
    event: &Expr,
    time: &Expr,
    dialect: Dialect,
    binder: &mut ParamBinder,
) -> CompileResult<String> {
    let mut statement = with_flow_ctes(
        Query::new(),
        schema,
        request,
        cube,
        binding,
        event,
        time,
        dialect,
        binder,
    )?;
    statement = statement
        .select(vec![
            SelectExpr::new(col("layer")),
            SelectExpr::new(col("event_name")),
            count_star().alias("entities"),
        ])
        .from(TableRef::new("flow_layers"))
        .group_by(vec![col("layer"), col("event_name")])
        .order_by(vec![
            OrderByExpr::asc(col("layer")),
            OrderByExpr::asc(col("event_name")),
        ]);
    Ok(statement.to_sql(dialect))
}

#[allow(clippy::too_many_arguments)]
fn links_statement(
    schema: &Schema,
    request: &FlowRequest,
    cube: &Cube,
    binding: &Expr,
    event: &Expr,
    time: &Expr,
    dialect: Dialect,
    binder: &mut ParamBinder,
) -> CompileResult<String> {
    let mut statement = with_flow_ctes(
        Query::new(),
        schema,
        request,
        cube,
        binding,
        event,
        time,
        dialect,
        binder,
    )?;
    statement = statement
        .select(vec![
            SelectExpr::new(table_col("a", "layer")).with_alias("source_layer"),
            SelectExpr::new(table_col("a", "event_name")).with_alias("source_event"),
            SelectExpr::new(table_col("b", "layer")).with_alias("target_layer"),
            SelectExpr::new(table_col("b", "event_name")).with_alias("target_event"),
            count_star().alias("transitions"),
        ])
        .from(TableRef::new("flow_layers").with_alias("a"))
        .inner_join(
            TableRef::new("flow_layers").with_alias("b"),
            table_col("a", "actor")
                .eq(table_col("b", "actor"))
                .and(table_col("b", "layer").eq(table_col("a", "layer").add(lit_int(1)))),
        )
        .group_by(vec![
            table_col("a", "layer"),
            table_col("a", "event_name"),
            table_col("b", "layer"),
            table_col("b", "event_name"),
        ])
        .order_by(vec![
            OrderByExpr::asc(col("source_layer")),
            OrderByExpr::asc(col("source_event")),
            OrderByExpr::asc(col("target_event")),
        ]);
    Ok(statement.to_sql(dialect))
}

/// Attach the shared CTE prefix: starting events, ranked expansions in both
/// directions, and the unioned layer collection.
#[allow(clippy::too_many_arguments)]
fn with_flow_ctes(
    mut statement: Query,
    schema: &Schema,
    request: &FlowRequest,
    cube: &Cube,
    binding: &Expr,
    event: &Expr,
    time: &Expr,
    dialect: Dialect,
    binder: &mut ParamBinder,
) -> CompileResult<Query> {
    let graph = SchemaGraph::new(schema);

    // flow_start: each entity's first qualifying event time.
    let paths = filter_join_paths(schema, &graph, &cube.name, request.start_filters.as_ref())?;
    let start = Query::new()
        .select(vec![
            SelectExpr::new(binding.clone()).with_alias("actor"),
            min(time.clone()).alias("start_at"),
        ])
        .from(table_ref_for(cube));
    let no_cte = |_: &str| -> Option<String> { None };
    let (mut start, _) = append_path_joins(start, schema, &paths, &no_cte)?;
    if let Some(filters) = &request.start_filters {
        let resolver = |member: &str| -> CompileResult<Expr> {
            match schema.resolve(member)? {
                crate::schema::ResolvedMember::Dimension { cube, dimension } => {
                    Ok(table_col(&cube_alias(&cube.name), dimension.source_column()))
                }
                crate::schema::ResolvedMember::Measure { .. } => {
                    Err(CompileError::IncompleteSpec(format!(
                        "measure '{member}' cannot appear in a flow starting filter"
                    )))
                }
            }
        };
        let predicate = compile_filter(schema, dialect, filters, binder, &resolver)?;
        start = start.filter(predicate);
    }
    start = start.group_by(vec![binding.clone()]);
    statement = statement.with_cte(Cte::new("flow_start", start));

    // flow_zero: the starting event itself, with its event name.
    let zero = Query::new()
        .select(vec![
            SelectExpr::new(table_col("s", "actor")).with_alias("actor"),
            SelectExpr::new(event.clone()).with_alias("event_name"),
            SelectExpr::new(table_col("s", "start_at")).with_alias("occurred_at"),
        ])
        .from(table_ref_for(cube))
        .inner_join(
            TableRef::new("flow_start").with_alias("s"),
            binding
                .clone()
                .eq(table_col("s", "actor"))
                .and(time.clone().eq(table_col("s", "start_at"))),
        );
    statement = statement.with_cte(Cte::new("flow_zero", zero));

    // Ranked expansions. ROW_NUMBER restarts per entity, ordered by event
    // time in the hop direction.
    let rank = |ascending: bool| -> Expr {
        let order = if ascending {
            WindowOrderBy::asc(time.clone())
        } else {
            WindowOrderBy::desc(time.clone())
        };
        row_number()
            .over()
            .partition_by(vec![binding.clone()])
            .order_by(vec![order])
            .build()
    };

    if request.steps_after > 0 {
        let after = Query::new()
            .select(vec![
                SelectExpr::new(binding.clone()).with_alias("actor"),
                SelectExpr::new(event.clone()).with_alias("event_name"),
                SelectExpr::new(time.clone()).with_alias("occurred_at"),
                rank(true).alias("layer"),
            ])
            .from(table_ref_for(cube))
            .inner_join(
                TableRef::new("flow_start").with_alias("s"),
                binding.clone().eq(table_col("s", "actor")),
            )
            .filter(time.clone().gt(table_col("s", "start_at")));
        statement = statement.with_cte(Cte::new("flow_after", after));
    }

    if request.steps_before > 0 {
        let before = Query::new()
            .select(vec![
                SelectExpr::new(binding.clone()).with_alias("actor"),
                SelectExpr::new(event.clone()).with_alias("event_name"),
                SelectExpr::new(time.clone()).with_alias("occurred_at"),
                rank(false).alias("layer"),
            ])
            .from(table_ref_for(cube))
            .inner_join(
                TableRef::new("flow_start").with_alias("s"),
                binding.clone().eq(table_col("s", "actor")),
            )
            .filter(time.clone().lt(table_col("s", "start_at")));
        statement = statement.with_cte(Cte::new("flow_before", before));
    }

    // flow_layers: layer 0 plus both bounded expansions.
    let mut branches = vec![Query::new()
        .select(vec![
            SelectExpr::new(col("actor")),
            lit_int(0).alias("layer"),
            SelectExpr::new(col("event_name")),
            SelectExpr::new(col("occurred_at")),
        ])
        .from(TableRef::new("flow_zero"))];

    if request.steps_after > 0 {
        branches.push(
            Query::new()
                .select(vec![
                    SelectExpr::new(col("actor")),
                    SelectExpr::new(col("layer")),
                    SelectExpr::new(col("event_name")),
                    SelectExpr::new(col("occurred_at")),
                ])
                .from(TableRef::new("flow_after"))
                .filter(col("layer").lte(lit_int(request.steps_after as i64))),
        );
    }
    if request.steps_before > 0 {
        branches.push(
            Query::new()
                .select(vec![
                    SelectExpr::new(col("actor")),
                    lit_int(0).sub(col("layer")).alias("layer"),
                    SelectExpr::new(col("event_name")),
                    SelectExpr::new(col("occurred_at")),
                ])
                .from(TableRef::new("flow_before"))
                .filter(col("layer").lte(lit_int(request.steps_before as i64))),
        );
    }

    statement = statement.with_cte(Cte::new("flow_layers", Query::union_all(branches)));
    Ok(statement)
}

/// Resolve a dimension that must live on the flow cube.
fn same_cube_dimension(
    schema: &Schema,
    cube: &Cube,
    member: &str,
    role: &str,
) -> CompileResult<Expr> {
    let (dim_cube, dimension) = schema.resolve_dimension(member)?;
    if dim_cube.name != cube.name {
        return Err(CompileError::IncompleteSpec(format!(
            "flow {role} '{member}' must belong to cube '{}'",
            cube.name
        )));
    }
    Ok(table_col(&cube_alias(&cube.name), dimension.source_column()))
}
