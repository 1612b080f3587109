use cubist::planner::plan_query;
use cubist::query::Query;
use cubist::schema::{
    Aggregation, Cube, Dimension, JoinColumn, Junction, Measure, Relationship, RelationshipKind,
    Schema, ValueType,
};

fn schema() -> Schema {
    let customers = Cube {
        name: "Customers".into(),
        title: None,
        table: "customers".into(),
        schema: None,
        measures: vec![Measure {
            name: "count".into(),
            aggregation: Aggregation::Count,
            column: None,
            value_type: ValueType::Number,
        }],
        dimensions: vec![
            Dimension {
                name: "id".into(),
                column: None,
                value_type: ValueType::Number,
            },
            Dimension {
                name: "region".into(),
                column: None,
                value_type: ValueType::String,
            },
        ],
        relationships: vec![
            Relationship {
                target: "Orders".into(),
                kind: RelationshipKind::HasMany,
                join_columns: vec![JoinColumn::new("id", "customer_id")],
                junction: None,
            },
            Relationship {
                target: "Segments".into(),
                kind: RelationshipKind::BelongsToMany,
                join_columns: vec![],
                junction: Some(Junction {
                    table: "customer_segments".into(),
                    schema: None,
                    source_columns: vec![JoinColumn::new("id", "customer_id")],
                    target_columns: vec![JoinColumn::new("segment_id", "id")],
                }),
            },
        ],
    };

    let orders = Cube {
        name: "Orders".into(),
        title: None,
        table: "orders".into(),
        schema: None,
        measures: vec![
            Measure {
                name: "count".into(),
                aggregation: Aggregation::Count,
                column: None,
                value_type: ValueType::Number,
            },
            Measure {
                name: "revenue".into(),
                aggregation: Aggregation::Sum,
                column: Some("amount".into()),
                value_type: ValueType::Number,
            },
        ],
        dimensions: vec![Dimension {
            name: "status".into(),
            column: None,
            value_type: ValueType::String,
        }],
        relationships: vec![],
    };

    let segments = Cube {
        name: "Segments".into(),
        title: None,
        table: "segments".into(),
        schema: None,
        measures: vec![Measure {
            name: "count".into(),
            aggregation: Aggregation::Count,
            column: None,
            value_type: ValueType::Number,
        }],
        dimensions: vec![Dimension {
            name: "name".into(),
            column: None,
            value_type: ValueType::String,
        }],
        relationships: vec![],
    };

    Schema::load(vec![customers, orders, segments]).unwrap()
}

fn query(measures: &[&str], dimensions: &[&str]) -> Query {
    Query {
        measures: measures.iter().map(|s| s.to_string()).collect(),
        dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn test_has_many_measures_are_pre_aggregated() {
    let schema = schema();
    let plan = plan_query(
        &schema,
        &query(&["Customers.count", "Orders.revenue"], &["Customers.region"]),
    )
    .unwrap();

    assert_eq!(plan.primary.cube, "Customers");
    assert_eq!(plan.pre_aggregations.len(), 1);

    let preagg = &plan.pre_aggregations[0];
    assert_eq!(preagg.cube, "Orders");
    assert_eq!(preagg.alias, "orders_agg");
    assert_eq!(preagg.measures, vec!["Orders.revenue".to_string()]);
    assert_eq!(preagg.join_keys, vec!["customer_id".to_string()]);
    assert_eq!(preagg.reason, "prevents fan-out from hasMany relationship");
}

#[test]
fn test_many_to_one_needs_no_pre_aggregation() {
    let schema = schema();
    // Orders anchors (it has the requested dimension); the path to
    // Customers walks the hasMany edge backwards, which cannot fan out.
    let plan = plan_query(
        &schema,
        &query(&["Orders.revenue", "Customers.count"], &["Orders.status"]),
    )
    .unwrap();

    assert_eq!(plan.primary.cube, "Orders");
    assert!(plan.pre_aggregations.is_empty());
}

#[test]
fn test_belongs_to_many_measures_are_pre_aggregated() {
    let schema = schema();
    let plan = plan_query(
        &schema,
        &query(&["Customers.count", "Segments.count"], &["Customers.region"]),
    )
    .unwrap();

    assert_eq!(plan.primary.cube, "Customers");
    let preagg = &plan.pre_aggregations[0];
    assert_eq!(preagg.cube, "Segments");
    assert_eq!(preagg.alias, "segments_agg");
    assert_eq!(preagg.join_keys, vec!["id".to_string()]);
    assert_eq!(
        preagg.reason,
        "prevents fan-out from belongsToMany relationship"
    );
}

#[test]
fn test_primary_cube_measures_never_pre_aggregated() {
    let schema = schema();
    let plan = plan_query(&schema, &query(&["Orders.revenue"], &["Orders.status"])).unwrap();
    assert!(plan.pre_aggregations.is_empty());
}

#[test]
fn test_planning_is_idempotent() {
    let schema = schema();
    let request = query(&["Customers.count", "Orders.revenue"], &["Customers.region"]);
    let first = plan_query(&schema, &request).unwrap();
    let second = plan_query(&schema, &request).unwrap();
    assert_eq!(first.pre_aggregations, second.pre_aggregations);
    assert_eq!(first.paths, second.paths);
}
