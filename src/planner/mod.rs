//! Query planning - primary cube selection, join path resolution, and
//! pre-aggregation planning.
//!
//! Planning is a pure function of {schema, query}: it builds a fresh
//! [`SchemaGraph`] per call, holds no shared state, and produces the same
//! plan for the same inputs every time. The plan feeds both SQL assembly
//! and the explainability record.

pub mod analysis;
pub mod path;
pub mod preagg;
pub mod primary;

pub use analysis::{
    CubeCandidate, JoinHop, PreAggregation, PrimarySelection, QueryAnalysis, ResolvedJoinPath,
    SelectionReason, StructuralSummary,
};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{CompileError, CompileResult};
use crate::query::Query;
use crate::schema::graph::SchemaGraph;
use crate::schema::{Schema, ValueType};

/// The full plan for one standard query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub primary: PrimarySelection,
    /// One resolved path per non-primary touched cube, ordered by target
    /// name for deterministic output.
    pub paths: Vec<ResolvedJoinPath>,
    pub pre_aggregations: Vec<PreAggregation>,
}

impl QueryPlan {
    /// Pre-aggregation entry for a cube, if one was planned.
    pub fn pre_aggregation_for(&self, cube: &str) -> Option<&PreAggregation> {
        self.pre_aggregations.iter().find(|p| p.cube == cube)
    }
}

/// Plan a standard query: validate members, pick the primary cube, resolve
/// join paths, and plan pre-aggregations.
pub fn plan_query(schema: &Schema, query: &Query) -> CompileResult<QueryPlan> {
    let mut touched: BTreeSet<String> = BTreeSet::new();
    let mut dimension_counts: HashMap<String, usize> = HashMap::new();
    let mut constrained: HashSet<String> = HashSet::new();
    let mut measures_by_cube: BTreeMap<String, Vec<String>> = BTreeMap::new();

    // Measures touch a cube without constraining it: an optional lookup
    // stays LEFT-joined so primary rows without related rows survive.
    for member in &query.measures {
        let (cube, _) = schema.resolve_measure(member)?;
        touched.insert(cube.name.clone());
        measures_by_cube
            .entry(cube.name.clone())
            .or_default()
            .push(member.clone());
    }

    let mut seen_dimensions: HashSet<&str> = HashSet::new();
    for member in &query.dimensions {
        let (cube, _) = schema.resolve_dimension(member)?;
        touched.insert(cube.name.clone());
        if seen_dimensions.insert(member.as_str()) {
            *dimension_counts.entry(cube.name.clone()).or_default() += 1;
        }
    }

    for time_dimension in &query.time_dimensions {
        let member = &time_dimension.dimension;
        let (cube, dimension) = schema.resolve_dimension(member)?;
        if dimension.value_type != ValueType::Time {
            return Err(CompileError::IncompleteSpec(format!(
                "'{member}' cannot be used as a time dimension (value type is not time)"
            )));
        }
        touched.insert(cube.name.clone());
        if seen_dimensions.insert(member.as_str()) {
            *dimension_counts.entry(cube.name.clone()).or_default() += 1;
        }
        // A date range pins the cube like any other filter.
        if time_dimension.date_range.is_some() {
            constrained.insert(cube.name.clone());
        }
    }

    if let Some(filters) = &query.filters {
        for member in filters.members() {
            let resolved = schema.resolve(member)?;
            touched.insert(resolved.cube().name.clone());
            constrained.insert(resolved.cube().name.clone());
        }
    }

    if touched.is_empty() {
        return Err(CompileError::IncompleteSpec(
            "query requests no measures, dimensions, or filters".into(),
        ));
    }

    let graph = SchemaGraph::new(schema);
    let primary = primary::select_primary(&graph, &touched, &dimension_counts)?;

    let mut paths = Vec::new();
    for target in &touched {
        if target != &primary.cube {
            paths.push(path::find_path(&graph, &primary.cube, target, &constrained)?);
        }
    }

    let pre_aggregations = preagg::plan_pre_aggregations(&primary.cube, &measures_by_cube, &paths);

    Ok(QueryPlan {
        primary,
        paths,
        pre_aggregations,
    })
}
