use cubist::compiler::compile_flow;
use cubist::error::CompileError;
use cubist::query::{FilterCondition, FilterNode, FilterOperator, FlowRequest};
use cubist::schema::{Cube, Dimension, Schema, ValueType};
use cubist::sql::Dialect;
use serde_json::json;

fn schema() -> Schema {
    Schema::load(vec![
        Cube {
            name: "Events".into(),
            title: None,
            table: "events".into(),
            schema: None,
            measures: vec![],
            dimensions: vec![
                Dimension {
                    name: "userId".into(),
                    column: Some("user_id".into()),
                    value_type: ValueType::Number,
                },
                Dimension {
                    name: "name".into(),
                    column: None,
                    value_type: ValueType::String,
                },
                Dimension {
                    name: "occurredAt".into(),
                    column: Some("occurred_at".into()),
                    value_type: ValueType::Time,
                },
            ],
            relationships: vec![],
        },
        Cube {
            name: "Other".into(),
            title: None,
            table: "other".into(),
            schema: None,
            measures: vec![],
            dimensions: vec![Dimension {
                name: "label".into(),
                column: None,
                value_type: ValueType::String,
            }],
            relationships: vec![],
        },
    ])
    .unwrap()
}

fn request(before: u32, after: u32) -> FlowRequest {
    FlowRequest {
        cube: "Events".into(),
        start_filters: Some(FilterNode::Condition(FilterCondition {
            member: "Events.name".into(),
            operator: FilterOperator::Equals,
            values: vec![json!("signup")],
        })),
        event_dimension: "Events.name".into(),
        binding_key: "Events.userId".into(),
        time_dimension: "Events.occurredAt".into(),
        steps_before: before,
        steps_after: after,
    }
}

#[test]
fn test_flow_emits_nodes_and_links() {
    let compiled = compile_flow(&schema(), &request(2, 3), Dialect::Postgres).unwrap();

    let nodes = &compiled.nodes.sql;
    assert!(nodes.contains("\"flow_start\" AS ("));
    assert!(nodes.contains("\"flow_zero\" AS ("));
    assert!(nodes.contains("\"flow_after\" AS ("));
    assert!(nodes.contains("\"flow_before\" AS ("));
    assert!(nodes.contains("\"flow_layers\" AS ("));
    assert!(nodes.contains("COUNT(*) AS \"entities\""));
    assert!(nodes.contains("GROUP BY \"layer\", \"event_name\""));

    let links = &compiled.links.sql;
    assert!(links.contains("\"b\".\"layer\" = \"a\".\"layer\" + 1"));
    assert!(links.contains("\"a\".\"actor\" = \"b\".\"actor\""));
    assert!(links.contains("COUNT(*) AS \"transitions\""));

    // Both statements carry the same start-filter parameter.
    assert_eq!(compiled.nodes.params, vec![json!("signup")]);
    assert_eq!(compiled.links.params, vec![json!("signup")]);
}

#[test]
fn test_layers_are_ranked_per_entity() {
    let compiled = compile_flow(&schema(), &request(1, 1), Dialect::Postgres).unwrap();
    let nodes = &compiled.nodes.sql;

    assert!(nodes.contains(
        "ROW_NUMBER() OVER (PARTITION BY \"events\".\"user_id\" \
         ORDER BY \"events\".\"occurred_at\" ASC)"
    ));
    assert!(nodes.contains(
        "ROW_NUMBER() OVER (PARTITION BY \"events\".\"user_id\" \
         ORDER BY \"events\".\"occurred_at\" DESC)"
    ));
    // The before-direction layers are negated into the shared collection.
    assert!(nodes.contains("0 - \"layer\" AS \"layer\""));
}

#[test]
fn test_layer_bounds_follow_request() {
    let compiled = compile_flow(&schema(), &request(2, 3), Dialect::Postgres).unwrap();
    let nodes = &compiled.nodes.sql;
    assert!(nodes.contains("\"layer\" <= 3"));
    assert!(nodes.contains("\"layer\" <= 2"));
}

#[test]
fn test_zero_hops_skip_direction() {
    let compiled = compile_flow(&schema(), &request(0, 2), Dialect::Postgres).unwrap();
    let nodes = &compiled.nodes.sql;
    assert!(!nodes.contains("flow_before"));
    assert!(nodes.contains("flow_after"));

    let metadata = &compiled.flow_metadata;
    assert_eq!(metadata.steps_before, 0);
    assert_eq!(metadata.steps_after, 2);
}

#[test]
fn test_foreign_dimension_is_rejected() {
    let mut bad = request(1, 1);
    bad.event_dimension = "Other.label".into();
    let err = compile_flow(&schema(), &bad, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}

#[test]
fn test_non_time_dimension_is_rejected() {
    let mut bad = request(1, 1);
    bad.time_dimension = "Events.name".into();
    let err = compile_flow(&schema(), &bad, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}
