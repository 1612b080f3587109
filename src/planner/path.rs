//! Join path resolution - breadth-first search over the relationship graph.
//!
//! Finds the shortest path (minimum hop count) from the primary cube to a
//! target cube; among equal-length paths it prefers the one with the fewest
//! ambiguous (many-to-many) hops, then lexicographic cube order so repeated
//! compilations resolve identically. A visited set bounds the search on
//! cyclic graphs, and the dequeue-order trace is kept for diagnostics
//! whether or not the search succeeds.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{CompileError, CompileResult};
use crate::schema::graph::{RelEdge, SchemaGraph};
use crate::schema::RelationshipKind;
use crate::sql::JoinType;

use super::analysis::{JoinHop, ResolvedJoinPath};

/// Find the best shortest path from `from` to `to`.
///
/// `constrained` lists cubes pinned by filters or requested measures; an
/// optional hasOne/hasMany lookup hop into an unconstrained cube becomes a
/// LEFT join, everything else joins INNER.
pub fn find_path(
    graph: &SchemaGraph,
    from: &str,
    to: &str,
    constrained: &HashSet<String>,
) -> CompileResult<ResolvedJoinPath> {
    if from == to {
        return Ok(ResolvedJoinPath {
            target: to.to_string(),
            hops: vec![],
            visited: vec![from.to_string()],
        });
    }

    let (distance, visited) = bfs_distance(graph, from, to);

    let Some(distance) = distance else {
        return Err(CompileError::PathNotFound {
            from: from.to_string(),
            to: to.to_string(),
            visited,
        });
    };

    // Enumerate every acyclic path of exactly the shortest length, then pick
    // the one with the fewest many-to-many hops, tie-broken by cube names.
    let paths = enumerate_paths(graph, from, to, distance);
    let best = paths
        .into_iter()
        .min_by_key(|p| (many_to_many_hops(p), cube_sequence(from, p)))
        .expect("BFS found the target, so at least one path exists");

    let hops = best
        .into_iter()
        .map(|(hop_from, hop_to, edge)| make_hop(hop_from, hop_to, edge, constrained))
        .collect();

    Ok(ResolvedJoinPath {
        target: to.to_string(),
        hops,
        visited,
    })
}

/// All cubes reachable from `from`, excluding `from` itself.
pub fn reachable_set(graph: &SchemaGraph, from: &str) -> HashSet<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    seen.insert(from.to_string());
    queue.push_back(from.to_string());

    while let Some(current) = queue.pop_front() {
        for (neighbor, _) in graph.neighbors(&current) {
            if seen.insert(neighbor.to_string()) {
                queue.push_back(neighbor.to_string());
            }
        }
    }

    seen.remove(from);
    seen
}

/// BFS shortest distance plus the dequeue-order visited trace.
fn bfs_distance(graph: &SchemaGraph, from: &str, to: &str) -> (Option<usize>, Vec<String>) {
    let mut trace: Vec<String> = Vec::new();
    let mut depth: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    depth.insert(from.to_string(), 0);
    queue.push_back(from.to_string());

    while let Some(current) = queue.pop_front() {
        let d = depth[&current];
        trace.push(current.clone());

        if current == to {
            return (Some(d), trace);
        }

        for (neighbor, _) in graph.neighbors(&current) {
            if !depth.contains_key(neighbor) {
                depth.insert(neighbor.to_string(), d + 1);
                queue.push_back(neighbor.to_string());
            }
        }
    }

    (None, trace)
}

type PathEdges<'g> = Vec<(String, String, &'g RelEdge)>;

/// Depth-first enumeration of acyclic paths with exactly `length` hops.
fn enumerate_paths<'g>(
    graph: &'g SchemaGraph,
    from: &str,
    to: &str,
    length: usize,
) -> Vec<PathEdges<'g>> {
    let mut results: Vec<PathEdges<'g>> = Vec::new();
    let mut stack: Vec<(String, PathEdges<'g>, HashSet<String>)> = Vec::new();

    let mut initial_visited = HashSet::new();
    initial_visited.insert(from.to_string());
    stack.push((from.to_string(), vec![], initial_visited));

    while let Some((current, path, visited)) = stack.pop() {
        if path.len() >= length {
            continue;
        }

        for (neighbor, edge) in graph.neighbors(&current) {
            if visited.contains(neighbor) {
                continue;
            }

            let mut new_path = path.clone();
            new_path.push((current.clone(), neighbor.to_string(), edge));

            if neighbor == to {
                if new_path.len() == length {
                    results.push(new_path);
                }
            } else {
                let mut new_visited = visited.clone();
                new_visited.insert(neighbor.to_string());
                stack.push((neighbor.to_string(), new_path, new_visited));
            }
        }
    }

    results
}

fn many_to_many_hops(path: &PathEdges<'_>) -> usize {
    path.iter()
        .filter(|(_, _, e)| e.kind == RelationshipKind::BelongsToMany)
        .count()
}

fn cube_sequence(from: &str, path: &PathEdges<'_>) -> Vec<String> {
    let mut seq = vec![from.to_string()];
    seq.extend(path.iter().map(|(_, to, _)| to.clone()));
    seq
}

fn make_hop(from: String, to: String, edge: &RelEdge, constrained: &HashSet<String>) -> JoinHop {
    let optional_lookup = !edge.reversed
        && matches!(
            edge.kind,
            RelationshipKind::HasOne | RelationshipKind::HasMany
        );
    let join_type = if optional_lookup && !constrained.contains(&to) {
        JoinType::Left
    } else {
        JoinType::Inner
    };

    JoinHop {
        from,
        to,
        kind: edge.kind,
        cardinality: edge.cardinality,
        reversed: edge.reversed,
        join_type,
        join_columns: edge.join_columns.clone(),
        junction: edge.junction.clone(),
    }
}
