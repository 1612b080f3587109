//! Primary cube selection - which cube anchors the FROM clause.
//!
//! A pure function of {schema, query}: identical inputs always produce the
//! same winner and the same candidate ranking. Ambiguity is never an error;
//! the full ranking ships in the analysis record so callers can see why a
//! cube won.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::CompileResult;
use crate::schema::graph::SchemaGraph;

use super::analysis::{CubeCandidate, PrimarySelection, SelectionReason};
use super::path;

/// Select the primary cube for a set of touched cubes.
///
/// `dimension_counts` maps cube name to the number of distinct dimensions
/// the query requests from it. Candidates are ranked by (a) dimension count
/// descending, (b) direct relationship edges into the touched set
/// descending, (c) name ascending. A candidate that cannot reach every
/// other touched cube is rejected from the ranking but still reported.
pub fn select_primary(
    graph: &SchemaGraph,
    touched: &BTreeSet<String>,
    dimension_counts: &HashMap<String, usize>,
) -> CompileResult<PrimarySelection> {
    let touched_vec: Vec<String> = touched.iter().cloned().collect();

    if touched.len() == 1 {
        let name = touched_vec[0].clone();
        return Ok(PrimarySelection {
            cube: name.clone(),
            reason: SelectionReason::SingleCube,
            candidates: vec![CubeCandidate {
                dimension_count: dimension_counts.get(&name).copied().unwrap_or(0),
                name,
                join_count: 0,
                reachable: true,
            }],
        });
    }

    let mut reachable: Vec<CubeCandidate> = Vec::new();
    let mut rejected: Vec<CubeCandidate> = Vec::new();
    // Remembered so a fully-disconnected query can report a proper path
    // error from the best-ranked rejected candidate.
    let mut first_unreachable: Option<(String, String)> = None;

    for name in &touched_vec {
        let reach = path::reachable_set(graph, name);
        let missing: Vec<&String> = touched_vec
            .iter()
            .filter(|other| other.as_str() != name && !reach.contains(*other))
            .collect();

        let candidate = CubeCandidate {
            name: name.clone(),
            dimension_count: dimension_counts.get(name).copied().unwrap_or(0),
            join_count: graph.direct_join_count(name, &touched_vec),
            reachable: missing.is_empty(),
        };

        if candidate.reachable {
            reachable.push(candidate);
        } else {
            if first_unreachable.is_none() {
                first_unreachable = Some((name.clone(), missing[0].clone()));
            }
            rejected.push(candidate);
        }
    }

    // Rank: most dimensions, then most connected, then name.
    reachable.sort_by(|a, b| {
        b.dimension_count
            .cmp(&a.dimension_count)
            .then(b.join_count.cmp(&a.join_count))
            .then(a.name.cmp(&b.name))
    });

    if reachable.is_empty() {
        let (from, to) = first_unreachable.expect("touched set is non-empty");
        // Surface the structured path error with its visited trace.
        let empty = HashSet::new();
        return match path::find_path(graph, &from, &to, &empty) {
            Err(err) => Err(err),
            Ok(_) => unreachable!("reachability said no path exists"),
        };
    }

    let winner = reachable[0].clone();
    let reason = selection_reason(&reachable);

    let mut candidates = reachable;
    candidates.extend(rejected);

    Ok(PrimarySelection {
        cube: winner.name,
        reason,
        candidates,
    })
}

/// Which ranking tier decided the winner.
fn selection_reason(ranked: &[CubeCandidate]) -> SelectionReason {
    if ranked.len() == 1 {
        return SelectionReason::MostDimensions;
    }
    let winner = &ranked[0];
    let runner_up = &ranked[1];

    if winner.dimension_count > runner_up.dimension_count {
        SelectionReason::MostDimensions
    } else if winner.join_count > runner_up.join_count {
        SelectionReason::MostConnected
    } else {
        SelectionReason::AlphabeticalFallback
    }
}
