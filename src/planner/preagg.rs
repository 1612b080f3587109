//! Pre-aggregation planning - the compiler's central correctness pass.
//!
//! Joining a one-to-many or many-to-many related cube multiplies
//! primary-side rows, which corrupts SUM/COUNT/AVG results. Whenever the
//! resolved path to a measure-bearing cube fans out, that cube's measures
//! are aggregated into an independent CTE keyed by its join columns before
//! the join happens. The plan entries carry a human-readable reason for the
//! analysis record.

use std::collections::BTreeMap;

use inflector::Inflector;

use super::analysis::{PreAggregation, ResolvedJoinPath};

/// Decide which non-primary cubes must be pre-aggregated.
///
/// `measures_by_cube` groups the query's qualified measures by their cube;
/// `paths` holds one resolved path per non-primary cube.
pub fn plan_pre_aggregations(
    primary: &str,
    measures_by_cube: &BTreeMap<String, Vec<String>>,
    paths: &[ResolvedJoinPath],
) -> Vec<PreAggregation> {
    let mut plans = Vec::new();

    for (cube, measures) in measures_by_cube {
        if cube == primary {
            continue;
        }
        let Some(path) = paths.iter().find(|p| &p.target == cube) else {
            continue;
        };
        let Some(fanout_hop) = path.hops.iter().find(|h| h.cardinality.causes_fanout()) else {
            continue;
        };

        let join_keys = path
            .hops
            .last()
            .map(|last| match &last.junction {
                Some(junction) => junction
                    .target_columns
                    .iter()
                    .map(|jc| jc.target_column.clone())
                    .collect(),
                None => last
                    .join_columns
                    .iter()
                    .map(|jc| jc.target_column.clone())
                    .collect(),
            })
            .unwrap_or_default();

        plans.push(PreAggregation {
            cube: cube.clone(),
            alias: format!("{}_agg", cube.to_snake_case()),
            reason: format!(
                "prevents fan-out from {} relationship",
                fanout_hop.kind.as_str()
            ),
            measures: measures.clone(),
            join_keys,
        });
    }

    plans
}
