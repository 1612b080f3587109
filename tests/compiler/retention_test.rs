use cubist::compiler::compile_retention;
use cubist::error::CompileError;
use cubist::query::{
    FilterCondition, FilterNode, FilterOperator, Granularity, RetentionKind, RetentionRequest,
};
use cubist::schema::{Cube, Dimension, Schema, ValueType};
use cubist::sql::Dialect;
use serde_json::json;

fn schema() -> Schema {
    Schema::load(vec![Cube {
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
    }])
    .unwrap()
}

fn request(kind: RetentionKind) -> RetentionRequest {
    RetentionRequest {
        cube: "Events".into(),
        binding_key: "Events.userId".into(),
        time_dimension: "Events.occurredAt".into(),
        cohort_filters: Some(FilterNode::Condition(FilterCondition {
            member: "Events.name".into(),
            operator: FilterOperator::Equals,
            values: vec![json!("signup")],
        })),
        activity_filters: Some(FilterNode::Condition(FilterCondition {
            member: "Events.name".into(),
            operator: FilterOperator::NotEquals,
            values: vec![json!("signup")],
        })),
        granularity: Granularity::Week,
        periods: 8,
        retention_type: kind,
    }
}

#[test]
fn test_classic_retention_structure() {
    let compiled = compile_retention(&schema(), &request(RetentionKind::Classic), Dialect::Postgres)
        .unwrap();

    assert!(compiled.sql.contains("\"cohort\" AS ("));
    assert!(compiled.sql.contains("\"activity\" AS ("));
    assert!(compiled.sql.contains("\"retained\" AS ("));
    // Cohort entry is the period of the first qualifying event.
    assert!(compiled
        .sql
        .contains("DATE_TRUNC('week', MIN(\"events\".\"occurred_at\")) AS \"cohort_period\""));
    assert!(compiled
        .sql
        .contains("DATE_TRUNC('week', \"events\".\"occurred_at\") AS \"activity_period\""));
    // Activity before cohort entry never counts.
    assert!(compiled
        .sql
        .contains("\"a\".\"activity_period\" >= \"c\".\"cohort_period\""));
    assert!(compiled.sql.contains("COUNT(DISTINCT \"actor\") AS \"entities\""));
    assert!(compiled.sql.contains("\"period_offset\" <= 8"));
    assert!(compiled
        .sql
        .contains("ORDER BY \"cohort_period\" ASC, \"period_offset\" ASC"));

    assert_eq!(compiled.params, vec![json!("signup"), json!("signup")]);
}

#[test]
fn test_rolling_retention_counts_latest_offset() {
    let compiled = compile_retention(&schema(), &request(RetentionKind::Rolling), Dialect::Postgres)
        .unwrap();

    assert!(compiled.sql.contains("\"actor_max\" AS ("));
    assert!(compiled.sql.contains("\"offsets\" AS ("));
    assert!(compiled
        .sql
        .contains("MAX(\"period_offset\") AS \"max_offset\""));
    assert!(compiled
        .sql
        .contains("\"m\".\"max_offset\" >= \"o\".\"period_offset\""));
    assert_eq!(compiled.retention_metadata.retention_type, RetentionKind::Rolling);
}

#[test]
fn test_offset_arithmetic_per_dialect() {
    let pg = compile_retention(&schema(), &request(RetentionKind::Classic), Dialect::Postgres)
        .unwrap();
    // Week offsets divide the epoch difference by a whole week.
    assert!(pg.sql.contains("EXTRACT(EPOCH FROM"));
    assert!(pg.sql.contains("/ 604800"));

    let mysql = compile_retention(&schema(), &request(RetentionKind::Classic), Dialect::MySql)
        .unwrap();
    assert!(mysql
        .sql
        .contains("TIMESTAMPDIFF(WEEK, `c`.`cohort_period`, `a`.`activity_period`)"));

    let duckdb = compile_retention(&schema(), &request(RetentionKind::Classic), Dialect::DuckDb)
        .unwrap();
    assert!(duckdb
        .sql
        .contains("DATE_DIFF('week', \"c\".\"cohort_period\", \"a\".\"activity_period\")"));
}

#[test]
fn test_zero_periods_rejected() {
    let mut bad = request(RetentionKind::Classic);
    bad.periods = 0;
    let err = compile_retention(&schema(), &bad, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}

#[test]
fn test_unknown_cube_rejected() {
    let mut bad = request(RetentionKind::Classic);
    bad.cube = "Nope".into();
    let err = compile_retention(&schema(), &bad, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::UnknownMember(_)));
}

#[test]
fn test_metadata_echoes_request() {
    let compiled = compile_retention(&schema(), &request(RetentionKind::Classic), Dialect::Postgres)
        .unwrap();
    let metadata = &compiled.retention_metadata;
    assert_eq!(metadata.binding_key, "Events.userId");
    assert_eq!(metadata.granularity, Granularity::Week);
    assert_eq!(metadata.periods, 8);
}
