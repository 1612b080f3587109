//! Query-planning rationale, reported alongside every compiled query.
//!
//! Debug panels and the external advisory service consume these records, so
//! everything serializes with camelCase field names and snake_case reason
//! strings. The analysis never influences execution - it is a transparent
//! account of decisions already made.

use serde::{Deserialize, Serialize};

use crate::schema::{Cardinality, JoinColumn, Junction, RelationshipKind};
use crate::sql::JoinType;

/// Why the primary cube won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Only one cube is touched by the query.
    SingleCube,
    /// Won on requested-dimension count.
    MostDimensions,
    /// Tied on dimensions, won on direct-relationship count.
    MostConnected,
    /// Tied on both criteria; deterministic name ordering decided.
    AlphabeticalFallback,
}

/// One ranked candidate for the primary-cube choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeCandidate {
    pub name: String,
    /// Distinct dimensions the query requests from this cube.
    pub dimension_count: usize,
    /// Direct relationship edges to other touched cubes.
    pub join_count: usize,
    /// Whether every other touched cube is reachable from here.
    pub reachable: bool,
}

/// The primary-cube decision with its full candidate report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimarySelection {
    pub cube: String,
    pub reason: SelectionReason,
    /// All candidates in ranked order, winners first; unreachable
    /// candidates trail with `reachable: false`.
    pub candidates: Vec<CubeCandidate>,
}

/// One hop in a resolved join path, carrying everything needed both to
/// emit the join and to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinHop {
    pub from: String,
    pub to: String,
    pub kind: RelationshipKind,
    /// Cardinality in traversal direction (from -> to).
    pub cardinality: Cardinality,
    /// True when the declared relationship is walked backwards.
    pub reversed: bool,
    pub join_type: JoinType,
    pub join_columns: Vec<JoinColumn>,
    /// Present for belongsToMany hops; expands to two join steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction: Option<Junction>,
}

impl JoinHop {
    /// Number of SQL join steps this hop expands to.
    pub fn step_count(&self) -> usize {
        if self.junction.is_some() {
            2
        } else {
            1
        }
    }
}

/// A resolved path from the primary cube to one referenced cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedJoinPath {
    pub target: String,
    pub hops: Vec<JoinHop>,
    /// Cubes visited during the search, in dequeue order. Recorded for
    /// diagnostics regardless of success.
    pub visited: Vec<String>,
}

impl ResolvedJoinPath {
    /// Does any hop on this path multiply primary-side rows?
    pub fn causes_fanout(&self) -> bool {
        self.hops.iter().any(|h| h.cardinality.causes_fanout())
    }
}

/// A planned pre-aggregation CTE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreAggregation {
    /// Source cube whose measures are aggregated before joining.
    pub cube: String,
    /// Generated CTE alias.
    pub alias: String,
    /// Natural-language rationale, e.g. "prevents fan-out from hasMany
    /// relationship".
    pub reason: String,
    /// Qualified measures aggregated inside the CTE.
    pub measures: Vec<String>,
    /// Columns on the source cube keying the CTE back into the join.
    pub join_keys: Vec<String>,
}

/// Structural summary of the compiled statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralSummary {
    pub cube_count: usize,
    pub join_count: usize,
    pub cte_count: usize,
}

/// The full planning rationale for one compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub primary_cube: String,
    pub selection_reason: SelectionReason,
    pub candidates: Vec<CubeCandidate>,
    pub join_paths: Vec<ResolvedJoinPath>,
    pub pre_aggregations: Vec<PreAggregation>,
    pub summary: StructuralSummary,
}
