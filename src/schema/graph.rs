//! Relationship graph over the schema's cubes.
//!
//! Relationships are declared per-cube, but path search treats the full set
//! as an undirected graph: every declared edge is stored twice in a petgraph
//! `DiGraph` (forward and reverse, with direction-adjusted cardinality and
//! join columns), alongside an adjacency map keyed by cube name. Cycles are
//! expected - self-referencing cubes and bidirectional joins are legal - so
//! traversal always carries a visited set.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::{Cardinality, JoinColumn, Junction, RelationshipKind, Schema};

/// A node in the relationship graph.
#[derive(Debug, Clone)]
pub struct CubeNode {
    pub name: String,
}

/// One traversable relationship edge, tagged with its direction.
///
/// Reverse edges carry swapped join columns and reversed cardinality so a
/// path can be walked left-to-right without re-deriving orientation.
#[derive(Debug, Clone)]
pub struct RelEdge {
    pub kind: RelationshipKind,
    pub cardinality: Cardinality,
    pub join_columns: Vec<JoinColumn>,
    pub junction: Option<Junction>,
    /// True when this edge traverses a declared relationship backwards.
    pub reversed: bool,
}

impl RelEdge {
    fn forward(rel: &super::Relationship) -> Self {
        Self {
            kind: rel.kind,
            cardinality: rel.kind.cardinality(),
            join_columns: rel.join_columns.clone(),
            junction: rel.junction.clone(),
            reversed: false,
        }
    }

    fn reverse_of(rel: &super::Relationship) -> Self {
        let join_columns = rel
            .join_columns
            .iter()
            .map(|jc| JoinColumn::new(jc.target_column.clone(), jc.source_column.clone()))
            .collect();
        let junction = rel.junction.as_ref().map(|j| Junction {
            table: j.table.clone(),
            schema: j.schema.clone(),
            source_columns: j
                .target_columns
                .iter()
                .map(|jc| JoinColumn::new(jc.target_column.clone(), jc.source_column.clone()))
                .collect(),
            target_columns: j
                .source_columns
                .iter()
                .map(|jc| JoinColumn::new(jc.target_column.clone(), jc.source_column.clone()))
                .collect(),
        });
        Self {
            kind: rel.kind,
            cardinality: rel.kind.cardinality().reverse(),
            join_columns,
            junction,
            reversed: true,
        }
    }
}

/// Graph view of a [`Schema`], built per compilation.
///
/// Construction is cheap relative to compilation and keeps the planner a
/// pure function of {schema, query} with no shared state.
#[derive(Debug)]
pub struct SchemaGraph<'a> {
    schema: &'a Schema,
    graph: DiGraph<CubeNode, RelEdge>,
    node_indices: HashMap<String, NodeIndex>,
}

impl<'a> SchemaGraph<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for cube in schema.cubes() {
            let idx = graph.add_node(CubeNode {
                name: cube.name.clone(),
            });
            node_indices.insert(cube.name.clone(), idx);
        }

        for cube in schema.cubes() {
            let from_idx = node_indices[&cube.name];
            for rel in &cube.relationships {
                let to_idx = node_indices[&rel.target];
                graph.add_edge(from_idx, to_idx, RelEdge::forward(rel));
                graph.add_edge(to_idx, from_idx, RelEdge::reverse_of(rel));
            }
        }

        Self {
            schema,
            graph,
            node_indices,
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn has_cube(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    pub(crate) fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_indices.get(name).copied()
    }

    pub(crate) fn cube_name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    /// Outgoing traversable edges from a cube, as (target name, edge).
    ///
    /// Neighbors are sorted by target name so traversal order - and with it
    /// candidate ranking and path tie-breaks - is deterministic.
    pub fn neighbors(&self, name: &str) -> Vec<(&str, &RelEdge)> {
        let Some(idx) = self.node_index(name) else {
            return Vec::new();
        };
        let mut out: Vec<(&str, &RelEdge)> = self
            .graph
            .edges(idx)
            .map(|e| (self.graph[e.target()].name.as_str(), e.weight()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Direct edge between two cubes, if one exists in either declaration
    /// direction. Forward declarations win over reverse traversals.
    pub fn direct_edge(&self, from: &str, to: &str) -> Option<&RelEdge> {
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;
        let mut found: Option<&RelEdge> = None;
        for e in self.graph.edges(from_idx) {
            if e.target() == to_idx {
                let edge = e.weight();
                if !edge.reversed {
                    return Some(edge);
                }
                found.get_or_insert(edge);
            }
        }
        found
    }

    /// Number of distinct members of `others` directly joinable from `name`.
    pub fn direct_join_count(&self, name: &str, others: &[String]) -> usize {
        others
            .iter()
            .filter(|o| o.as_str() != name && self.direct_edge(name, o).is_some())
            .count()
    }
}
