use std::collections::HashSet;

use cubist::error::CompileError;
use cubist::planner::path::{find_path, reachable_set};
use cubist::schema::graph::SchemaGraph;
use cubist::schema::{
    Cardinality, Cube, Dimension, JoinColumn, Junction, Relationship, RelationshipKind, Schema,
    ValueType,
};
use cubist::sql::JoinType;

fn cube(name: &str, relationships: Vec<Relationship>) -> Cube {
    Cube {
        name: name.into(),
        title: None,
        table: name.to_lowercase(),
        schema: None,
        measures: vec![],
        dimensions: vec![Dimension {
            name: "id".into(),
            column: None,
            value_type: ValueType::Number,
        }],
        relationships,
    }
}

fn has_many(target: &str) -> Relationship {
    Relationship {
        target: target.into(),
        kind: RelationshipKind::HasMany,
        join_columns: vec![JoinColumn::new("id", "parent_id")],
        junction: None,
    }
}

fn belongs_to_many(target: &str, junction_table: &str) -> Relationship {
    Relationship {
        target: target.into(),
        kind: RelationshipKind::BelongsToMany,
        join_columns: vec![],
        junction: Some(Junction {
            table: junction_table.into(),
            schema: None,
            source_columns: vec![JoinColumn::new("id", "source_id")],
            target_columns: vec![JoinColumn::new("target_id", "id")],
        }),
    }
}

fn no_constraints() -> HashSet<String> {
    HashSet::new()
}

#[test]
fn test_shortest_path_on_chain() {
    // A -< B -< C -< D
    let schema = Schema::load(vec![
        cube("A", vec![has_many("B")]),
        cube("B", vec![has_many("C")]),
        cube("C", vec![has_many("D")]),
        cube("D", vec![]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    let path = find_path(&graph, "A", "D", &no_constraints()).unwrap();
    assert_eq!(path.hops.len(), 3);
    assert_eq!(path.hops[0].to, "B");
    assert_eq!(path.hops[2].to, "D");
}

#[test]
fn test_direct_edge_beats_detour() {
    // A -< B -< C plus a direct A -< C edge.
    let schema = Schema::load(vec![
        cube("A", vec![has_many("B"), has_many("C")]),
        cube("B", vec![has_many("C")]),
        cube("C", vec![]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    let path = find_path(&graph, "A", "C", &no_constraints()).unwrap();
    assert_eq!(path.hops.len(), 1);
    assert_eq!(path.hops[0].to, "C");
}

#[test]
fn test_cyclic_graph_terminates() {
    // A -< B -< C -< A: a cycle in the declared relationships.
    let schema = Schema::load(vec![
        cube("A", vec![has_many("B")]),
        cube("B", vec![has_many("C")]),
        cube("C", vec![has_many("A")]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    // Reached in one hop by walking C's declaration backwards.
    let path = find_path(&graph, "A", "C", &no_constraints()).unwrap();
    assert_eq!(path.hops.len(), 1);
    assert!(path.hops[0].reversed);
    assert_eq!(path.hops[0].cardinality, Cardinality::ManyToOne);

    let reachable = reachable_set(&graph, "A");
    assert_eq!(reachable.len(), 2);
}

#[test]
fn test_path_not_found_carries_visited_trace() {
    let schema = Schema::load(vec![
        cube("A", vec![has_many("B")]),
        cube("B", vec![]),
        cube("Island", vec![]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    let err = find_path(&graph, "A", "Island", &no_constraints()).unwrap_err();
    match err {
        CompileError::PathNotFound { from, to, visited } => {
            assert_eq!(from, "A");
            assert_eq!(to, "Island");
            assert_eq!(visited, vec!["A".to_string(), "B".to_string()]);
        }
        other => panic!("expected PathNotFound, got {other:?}"),
    }
}

#[test]
fn test_visited_trace_recorded_on_success() {
    let schema = Schema::load(vec![
        cube("A", vec![has_many("B")]),
        cube("B", vec![has_many("C")]),
        cube("C", vec![]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    let path = find_path(&graph, "A", "C", &no_constraints()).unwrap();
    assert_eq!(path.visited[0], "A");
    assert!(path.visited.contains(&"C".to_string()));
}

#[test]
fn test_fewest_many_to_many_hops_wins_tie() {
    // Two 2-hop routes from Start to End; the one through Mid avoids the
    // ambiguous belongsToMany edge.
    let schema = Schema::load(vec![
        cube("Start", vec![has_many("Mid"), belongs_to_many("Via", "start_via")]),
        cube("Mid", vec![has_many("End")]),
        cube("Via", vec![has_many("End")]),
        cube("End", vec![]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    let path = find_path(&graph, "Start", "End", &no_constraints()).unwrap();
    assert_eq!(path.hops.len(), 2);
    assert_eq!(path.hops[0].to, "Mid");
    assert_eq!(path.hops[0].kind, RelationshipKind::HasMany);
}

#[test]
fn test_junction_hop_expands_to_two_steps() {
    let schema = Schema::load(vec![
        cube("Start", vec![belongs_to_many("End", "start_end")]),
        cube("End", vec![]),
    ])
    .unwrap();
    let graph = SchemaGraph::new(&schema);

    let path = find_path(&graph, "Start", "End", &no_constraints()).unwrap();
    assert_eq!(path.hops.len(), 1);
    let hop = &path.hops[0];
    assert_eq!(hop.kind, RelationshipKind::BelongsToMany);
    assert_eq!(hop.cardinality, Cardinality::ManyToMany);
    assert_eq!(hop.step_count(), 2);
    assert_eq!(hop.junction.as_ref().unwrap().table, "start_end");
}

#[test]
fn test_join_type_tracks_constraints() {
    let schema = Schema::load(vec![cube("A", vec![has_many("B")]), cube("B", vec![])]).unwrap();
    let graph = SchemaGraph::new(&schema);

    // Optional hasMany lookup: LEFT.
    let path = find_path(&graph, "A", "B", &no_constraints()).unwrap();
    assert_eq!(path.hops[0].join_type, JoinType::Left);

    // Same hop with the target constrained: INNER.
    let constrained: HashSet<String> = ["B".to_string()].into_iter().collect();
    let path = find_path(&graph, "A", "B", &constrained).unwrap();
    assert_eq!(path.hops[0].join_type, JoinType::Inner);

    // Walking the edge backwards is a required parent lookup: INNER.
    let path = find_path(&graph, "B", "A", &no_constraints()).unwrap();
    assert!(path.hops[0].reversed);
    assert_eq!(path.hops[0].join_type, JoinType::Inner);
}

#[test]
fn test_same_cube_is_empty_path() {
    let schema = Schema::load(vec![cube("A", vec![])]).unwrap();
    let graph = SchemaGraph::new(&schema);
    let path = find_path(&graph, "A", "A", &no_constraints()).unwrap();
    assert!(path.hops.is_empty());
    assert_eq!(path.visited, vec!["A".to_string()]);
}
