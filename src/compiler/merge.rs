//! Multi-query merge engine.
//!
//! Three strategies over independently described queries: `concat` keeps
//! them as parallel series, `merge` unions their measure sets into one
//! statement sharing the first query's dimension cohort and join plan, and
//! `funnel` chains them as funnel steps (legacy alias). Merge-mode
//! validation runs before any SQL is generated.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::planner::plan_query;
use crate::query::{FunnelRequest, FunnelStep, MergeStrategy, MultiQueryRequest};
use crate::schema::Schema;
use crate::sql::Dialect;

use super::funnel::{compile_funnel, FunnelCompiled};
use super::standard::compile_standard;
use super::CompiledQuery;

/// Result of a multi-query compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "result", rename_all = "camelCase")]
pub enum MergedCompiled {
    /// Each query compiled independently; results stay parallel series.
    Concat(Vec<CompiledQuery>),
    /// One statement carrying the unioned measure set.
    Merge(CompiledQuery),
    /// Queries chained as funnel steps.
    Funnel(FunnelCompiled),
}

pub fn compile_multi(
    schema: &Schema,
    request: &MultiQueryRequest,
    dialect: Dialect,
) -> CompileResult<MergedCompiled> {
    if request.queries.is_empty() {
        return Err(CompileError::IncompleteSpec(
            "multi-query request carries no queries".into(),
        ));
    }

    match request.strategy {
        MergeStrategy::Concat => {
            let mut compiled = Vec::with_capacity(request.queries.len());
            for query in &request.queries {
                compiled.push(compile_standard(schema, query, dialect)?);
            }
            Ok(MergedCompiled::Concat(compiled))
        }

        MergeStrategy::Merge => {
            let first = &request.queries[0];
            let cohort: BTreeSet<&str> = first
                .dimensions
                .iter()
                .map(String::as_str)
                .chain(first.time_dimensions.iter().map(|t| t.dimension.as_str()))
                .collect();

            // Fail fast: a later query must not introduce a dimension
            // outside the first query's cohort - there is no deterministic
            // way to align its rows.
            for (index, query) in request.queries.iter().enumerate().skip(1) {
                for dimension in query
                    .dimensions
                    .iter()
                    .map(String::as_str)
                    .chain(query.time_dimensions.iter().map(|t| t.dimension.as_str()))
                {
                    if !cohort.contains(dimension) {
                        return Err(CompileError::IncompleteSpec(format!(
                            "merge query #{index} introduces dimension '{dimension}' \
                             absent from the first query"
                        )));
                    }
                }
            }

            let mut combined = first.clone();
            for query in request.queries.iter().skip(1) {
                for measure in &query.measures {
                    if !combined.measures.contains(measure) {
                        combined.measures.push(measure.clone());
                    }
                }
            }
            Ok(MergedCompiled::Merge(compile_standard(
                schema, &combined, dialect,
            )?))
        }

        MergeStrategy::Funnel => {
            let binding_key = request.binding_key.clone().ok_or_else(|| {
                CompileError::IncompleteSpec(
                    "funnel strategy requires a binding key on the multi-query request".into(),
                )
            })?;
            let time_dimension = request.time_dimension.clone().ok_or_else(|| {
                CompileError::IncompleteSpec(
                    "funnel strategy requires a time dimension on the multi-query request".into(),
                )
            })?;

            let mut steps = Vec::with_capacity(request.queries.len());
            for query in &request.queries {
                // The query's own primary-cube selection anchors its step.
                let plan = plan_query(schema, query)?;
                steps.push(FunnelStep {
                    name: None,
                    cube: plan.primary.cube,
                    filters: query.filters.clone(),
                    time_to_convert: None,
                });
            }

            let funnel = FunnelRequest {
                steps,
                binding_key,
                time_dimension,
            };
            Ok(MergedCompiled::Funnel(compile_funnel(
                schema, &funnel, dialect,
            )?))
        }
    }
}
