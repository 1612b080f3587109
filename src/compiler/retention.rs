//! Retention compiler - cohorts against subsequent activity.
//!
//! The cohort CTE groups entities by the period of their first qualifying
//! event; the activity CTE collects each entity's qualifying activity
//! periods. Their join produces a cohort x relative-period matrix of
//! retained-entity counts. `classic` counts an entity in the exact period
//! of its activity; `rolling` counts it at every offset up to its latest
//! observed activity.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompileError, CompileResult};
use crate::query::{RetentionKind, RetentionRequest};
use crate::schema::graph::SchemaGraph;
use crate::schema::{Cube, Schema, ValueType};
use crate::sql::expr::{col, count_distinct, max, min, table_col, Expr, ExprExt};
use crate::sql::query::SelectExpr;
use crate::sql::{Cte, Dialect, OrderByExpr, ParamBinder, Query, SqlDialect, TableRef};

use super::common::{append_path_joins, cube_alias, filter_join_paths, table_ref_for, truncate};
use super::filters::compile_filter;

/// Compiled retention matrix query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionCompiled {
    pub sql: String,
    pub params: Vec<Value>,
    pub retention_metadata: RetentionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionMetadata {
    pub binding_key: String,
    pub time_dimension: String,
    pub granularity: crate::query::Granularity,
    pub periods: u32,
    pub retention_type: RetentionKind,
}

pub fn compile_retention(
    schema: &Schema,
    request: &RetentionRequest,
    dialect: Dialect,
) -> CompileResult<RetentionCompiled> {
    if request.periods == 0 {
        return Err(CompileError::IncompleteSpec(
            "retention requires at least one period".into(),
        ));
    }

    let cube = schema
        .cube(&request.cube)
        .ok_or_else(|| CompileError::UnknownMember(request.cube.clone()))?;
    let binding = same_cube_dimension(schema, cube, &request.binding_key, "binding key")?;
    let time = same_cube_dimension(schema, cube, &request.time_dimension, "time dimension")?;
    let (_, time_dim) = schema.resolve_dimension(&request.time_dimension)?;
    if time_dim.value_type != ValueType::Time {
        return Err(CompileError::IncompleteSpec(format!(
            "'{}' cannot be used as a retention time dimension",
            request.time_dimension
        )));
    }

    let graph = SchemaGraph::new(schema);
    let mut binder = ParamBinder::new();
    let mut statement = Query::new();

    // cohort: entities grouped by the period of their first qualifying
    // event under the cohort filter.
    let cohort_paths =
        filter_join_paths(schema, &graph, &cube.name, request.cohort_filters.as_ref())?;
    let cohort_period = truncate(dialect, request.granularity, min(time.clone()));
    let cohort = Query::new()
        .select(vec![
            SelectExpr::new(binding.clone()).with_alias("actor"),
            cohort_period.alias("cohort_period"),
        ])
        .from(table_ref_for(cube));
    let no_cte = |_: &str| -> Option<String> { None };
    let (mut cohort, _) = append_path_joins(cohort, schema, &cohort_paths, &no_cte)?;
    if let Some(filters) = &request.cohort_filters {
        let resolver = dimension_resolver(schema, "retention cohort filter");
        cohort = cohort.filter(compile_filter(schema, dialect, filters, &mut binder, &resolver)?);
    }
    cohort = cohort.group_by(vec![binding.clone()]);
    statement = statement.with_cte(Cte::new("cohort", cohort));

    // activity: distinct (entity, period) pairs of qualifying events.
    let activity_paths =
        filter_join_paths(schema, &graph, &cube.name, request.activity_filters.as_ref())?;
    let activity_period = truncate(dialect, request.granularity, time.clone());
    let activity = Query::new()
        .select(vec![
            SelectExpr::new(binding.clone()).with_alias("actor"),
            activity_period.alias("activity_period"),
        ])
        .distinct()
        .from(table_ref_for(cube));
    let (mut activity, _) = append_path_joins(activity, schema, &activity_paths, &no_cte)?;
    if let Some(filters) = &request.activity_filters {
        let resolver = dimension_resolver(schema, "retention activity filter");
        activity =
            activity.filter(compile_filter(schema, dialect, filters, &mut binder, &resolver)?);
    }
    statement = statement.with_cte(Cte::new("activity", activity));

    // retained: whole-period offset of each activity from its cohort entry.
    let offset_expr = Expr::Raw(
        dialect
            .emit_date_diff(
                request.granularity.as_sql(),
                &table_col("c", "cohort_period").to_tokens_for_dialect(dialect),
                &table_col("a", "activity_period").to_tokens_for_dialect(dialect),
            )
            .serialize(dialect),
    );
    let retained = Query::new()
        .select(vec![
            SelectExpr::new(table_col("c", "actor")).with_alias("actor"),
            SelectExpr::new(table_col("c", "cohort_period")).with_alias("cohort_period"),
            offset_expr.alias("period_offset"),
        ])
        .from(TableRef::new("cohort").with_alias("c"))
        .inner_join(
            TableRef::new("activity").with_alias("a"),
            table_col("a", "actor").eq(table_col("c", "actor")),
        )
        .filter(table_col("a", "activity_period").gte(table_col("c", "cohort_period")));
    statement = statement.with_cte(Cte::new("retained", retained));

    let periods = request.periods as i64;
    statement = match request.retention_type {
        RetentionKind::Classic => statement
            .select(vec![
                SelectExpr::new(col("cohort_period")),
                SelectExpr::new(col("period_offset")),
                count_distinct(col("actor")).alias("entities"),
            ])
            .from(TableRef::new("retained"))
            .filter(col("period_offset").lte(periods))
            .group_by(vec![col("cohort_period"), col("period_offset")]),

        RetentionKind::Rolling => {
            // Entity counted at offset k when its latest activity offset
            // reaches k. Observed offsets bound the matrix rows.
            let actor_max = Query::new()
                .select(vec![
                    SelectExpr::new(col("actor")),
                    SelectExpr::new(col("cohort_period")),
                    max(col("period_offset")).alias("max_offset"),
                ])
                .from(TableRef::new("retained"))
                .group_by(vec![col("actor"), col("cohort_period")]);

            let offsets = Query::new()
                .select(vec![
                    SelectExpr::new(col("cohort_period")),
                    SelectExpr::new(col("period_offset")),
                ])
                .distinct()
                .from(TableRef::new("retained"))
                .filter(col("period_offset").lte(periods));

            statement
                .with_cte(Cte::new("actor_max", actor_max))
                .with_cte(Cte::new("offsets", offsets))
                .select(vec![
                    SelectExpr::new(table_col("o", "cohort_period")).with_alias("cohort_period"),
                    SelectExpr::new(table_col("o", "period_offset")).with_alias("period_offset"),
                    count_distinct(table_col("m", "actor")).alias("entities"),
                ])
                .from(TableRef::new("offsets").with_alias("o"))
                .inner_join(
                    TableRef::new("actor_max").with_alias("m"),
                    table_col("m", "cohort_period")
                        .eq(table_col("o", "cohort_period"))
                        .and(table_col("m", "max_offset").gte(table_col("o", "period_offset"))),
                )
                .group_by(vec![
                    table_col("o", "cohort_period"),
                    table_col("o", "period_offset"),
                ])
        }
    };

    statement = statement.order_by(vec![
        OrderByExpr::asc(col("cohort_period")),
        OrderByExpr::asc(col("period_offset")),
    ]);

    Ok(RetentionCompiled {
        sql: statement.to_sql(dialect),
        params: binder.into_values(),
        retention_metadata: RetentionMetadata {
            binding_key: request.binding_key.clone(),
            time_dimension: request.time_dimension.clone(),
            granularity: request.granularity,
            periods: request.periods,
            retention_type: request.retention_type,
        },
    })
}

fn same_cube_dimension(
    schema: &Schema,
    cube: &Cube,
    member: &str,
    role: &str,
) -> CompileResult<Expr> {
    let (dim_cube, dimension) = schema.resolve_dimension(member)?;
    if dim_cube.name != cube.name {
        return Err(CompileError::IncompleteSpec(format!(
            "retention {role} '{member}' must belong to cube '{}'",
            cube.name
        )));
    }
    Ok(table_col(&cube_alias(&cube.name), dimension.source_column()))
}

fn dimension_resolver<'a>(
    schema: &'a Schema,
    context: &'static str,
) -> impl Fn(&str) -> CompileResult<Expr> + 'a {
    move |member: &str| match schema.resolve(member)? {
        crate::schema::ResolvedMember::Dimension { cube, dimension } => {
            Ok(table_col(&cube_alias(&cube.name), dimension.source_column()))
        }
        crate::schema::ResolvedMember::Measure { .. } => Err(CompileError::IncompleteSpec(
            format!("measure '{member}' cannot appear in a {context}"),
        )),
    }
}
