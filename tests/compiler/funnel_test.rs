use cubist::compiler::compile_funnel;
use cubist::error::CompileError;
use cubist::query::{FilterCondition, FilterNode, FilterOperator, FunnelRequest, FunnelStep, StepWindow};
use cubist::schema::{
    Aggregation, Cube, Dimension, JoinColumn, Measure, Relationship, RelationshipKind, Schema,
    ValueType,
};
use cubist::sql::Dialect;
use serde_json::json;

fn events_cube() -> Cube {
    Cube {
        name: "Events".into(),
        title: None,
        table: "events".into(),
        schema: None,
        measures: vec![Measure {
            name: "count".into(),
            aggregation: Aggregation::Count,
            column: None,
            value_type: ValueType::Number,
        }],
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
        relationships: vec![Relationship {
            target: "Users".into(),
            kind: RelationshipKind::BelongsTo,
            join_columns: vec![JoinColumn::new("user_id", "id")],
            junction: None,
        }],
    }
}

fn users_cube() -> Cube {
    Cube {
        name: "Users".into(),
        title: None,
        table: "users".into(),
        schema: None,
        measures: vec![],
        dimensions: vec![
            Dimension {
                name: "id".into(),
                column: None,
                value_type: ValueType::Number,
            },
            Dimension {
                name: "plan".into(),
                column: None,
                value_type: ValueType::String,
            },
        ],
        relationships: vec![],
    }
}

fn schema() -> Schema {
    Schema::load(vec![events_cube(), users_cube()]).unwrap()
}

fn name_filter(value: &str) -> FilterNode {
    FilterNode::Condition(FilterCondition {
        member: "Events.name".into(),
        operator: FilterOperator::Equals,
        values: vec![json!(value)],
    })
}

fn step(name: &str, event: &str, window: Option<&str>) -> FunnelStep {
    FunnelStep {
        name: Some(name.into()),
        cube: "Events".into(),
        filters: Some(name_filter(event)),
        time_to_convert: window.map(|w| StepWindow::parse(w).unwrap()),
    }
}

fn three_step_request() -> FunnelRequest {
    FunnelRequest {
        steps: vec![
            step("Visited", "visit", None),
            step("Signed up", "signup", Some("P1D")),
            step("Purchased", "purchase", Some("P1D")),
        ],
        binding_key: "Events.userId".into(),
        time_dimension: "Events.occurredAt".into(),
    }
}

#[test]
fn test_three_step_funnel_structure() {
    let compiled = compile_funnel(&schema(), &three_step_request(), Dialect::Postgres).unwrap();

    assert!(compiled.sql.contains("\"step_0\" AS ("));
    assert!(compiled.sql.contains("\"step_1\" AS ("));
    assert!(compiled.sql.contains("\"step_2\" AS ("));
    assert!(compiled.sql.contains("\"funnel_steps\" AS ("));
    assert_eq!(compiled.sql.matches("UNION ALL").count(), 2);
    assert!(compiled.sql.contains("FIRST_VALUE(\"entities\")"));
    assert!(compiled.sql.contains("ORDER BY \"step_index\" ASC"));

    let metadata = &compiled.funnel_metadata;
    assert_eq!(metadata.steps.len(), 3);
    assert_eq!(metadata.steps[0].window_seconds, None);
    assert_eq!(metadata.steps[1].window_seconds, Some(86_400));
}

#[test]
fn test_membership_filter_is_surfaced_in_step_sql() {
    let compiled = compile_funnel(&schema(), &three_step_request(), Dialect::Postgres).unwrap();
    let step_1 = &compiled.funnel_metadata.steps[1];

    // The implicit IN-filter against the previous step appears as a join
    // in the executed per-step query.
    assert!(step_1
        .sql
        .contains("INNER JOIN \"step_0\" AS \"prev\" ON \"events\".\"user_id\" = \"prev\".\"actor\""));
    assert!(step_1
        .sql
        .contains("\"events\".\"occurred_at\" >= \"prev\".\"occurred_at\""));
    // And the conversion window bounds elapsed time.
    assert!(step_1
        .sql
        .contains("\"events\".\"occurred_at\" <= \"prev\".\"occurred_at\" + INTERVAL '86400 second'"));
}

#[test]
fn test_step_zero_has_no_window() {
    let compiled = compile_funnel(&schema(), &three_step_request(), Dialect::Postgres).unwrap();
    let step_0 = &compiled.funnel_metadata.steps[0];
    assert!(!step_0.sql.contains("INTERVAL"));
    assert!(!step_0.sql.contains("\"prev\""));
    assert!(step_0.sql.contains("MIN(\"events\".\"occurred_at\") AS \"occurred_at\""));
    assert!(step_0.sql.contains("GROUP BY \"events\".\"user_id\""));
}

#[test]
fn test_unbounded_transition_when_window_missing() {
    let mut request = three_step_request();
    request.steps[2].time_to_convert = None;
    let compiled = compile_funnel(&schema(), &request, Dialect::Postgres).unwrap();
    let step_2 = &compiled.funnel_metadata.steps[2];
    assert!(step_2.sql.contains("\"prev\".\"occurred_at\""));
    assert!(!step_2.sql.contains("INTERVAL"));
}

#[test]
fn test_step_filters_and_names_bind_in_order() {
    let compiled = compile_funnel(&schema(), &three_step_request(), Dialect::Postgres).unwrap();
    assert_eq!(
        compiled.params,
        vec![
            json!("visit"),
            json!("signup"),
            json!("purchase"),
            json!("Visited"),
            json!("Signed up"),
            json!("Purchased"),
        ]
    );
}

#[test]
fn test_cross_cube_step_filter_joins() {
    let mut request = three_step_request();
    request.steps[1].filters = Some(FilterNode::And {
        and: vec![
            name_filter("signup"),
            FilterNode::Condition(FilterCondition {
                member: "Users.plan".into(),
                operator: FilterOperator::Equals,
                values: vec![json!("pro")],
            }),
        ],
    });

    let compiled = compile_funnel(&schema(), &request, Dialect::Postgres).unwrap();
    let step_1 = &compiled.funnel_metadata.steps[1];
    assert!(step_1
        .sql
        .contains("INNER JOIN \"users\" AS \"users\" ON \"events\".\"user_id\" = \"users\".\"id\""));
    assert!(step_1.sql.contains("\"users\".\"plan\" = "));
}

#[test]
fn test_step_zero_window_is_rejected() {
    let mut request = three_step_request();
    request.steps[0].time_to_convert = Some(StepWindow::parse("P1D").unwrap());
    let err = compile_funnel(&schema(), &request, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}

#[test]
fn test_empty_funnel_is_rejected() {
    let request = FunnelRequest {
        steps: vec![],
        binding_key: "Events.userId".into(),
        time_dimension: "Events.occurredAt".into(),
    };
    let err = compile_funnel(&schema(), &request, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}

#[test]
fn test_non_time_dimension_is_rejected() {
    let mut request = three_step_request();
    request.time_dimension = "Events.name".into();
    let err = compile_funnel(&schema(), &request, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}

#[test]
fn test_funnel_compiles_for_mysql_placeholders() {
    let compiled = compile_funnel(&schema(), &three_step_request(), Dialect::MySql).unwrap();
    assert!(!compiled.sql.contains("$1"));
    assert_eq!(compiled.sql.matches('?').count(), 6);
}
