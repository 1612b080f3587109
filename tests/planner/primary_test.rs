use cubist::error::CompileError;
use cubist::planner::{plan_query, SelectionReason};
use cubist::query::Query;
use cubist::schema::{
    Aggregation, Cube, Dimension, JoinColumn, Measure, Relationship, RelationshipKind, Schema,
    ValueType,
};

fn cube(name: &str, table: &str) -> Cube {
    Cube {
        name: name.into(),
        title: None,
        table: table.into(),
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
    }
}

fn relationship(target: &str, kind: RelationshipKind, source: &str, dest: &str) -> Relationship {
    Relationship {
        target: target.into(),
        kind,
        join_columns: vec![JoinColumn::new(source, dest)],
        junction: None,
    }
}

/// Customers -< Orders -< LineItems >- Products
fn schema() -> Schema {
    let mut customers = cube("Customers", "customers");
    customers.dimensions.push(Dimension {
        name: "region".into(),
        column: None,
        value_type: ValueType::String,
    });
    customers
        .relationships
        .push(relationship("Orders", RelationshipKind::HasMany, "id", "customer_id"));

    let mut orders = cube("Orders", "orders");
    orders.dimensions.push(Dimension {
        name: "status".into(),
        column: None,
        value_type: ValueType::String,
    });
    orders
        .relationships
        .push(relationship("LineItems", RelationshipKind::HasMany, "id", "order_id"));

    let mut line_items = cube("LineItems", "line_items");
    line_items.measures.push(Measure {
        name: "quantity".into(),
        aggregation: Aggregation::Sum,
        column: Some("quantity".into()),
        value_type: ValueType::Number,
    });
    line_items.relationships.push(relationship(
        "Products",
        RelationshipKind::BelongsTo,
        "product_id",
        "id",
    ));

    Schema::load(vec![
        customers,
        orders,
        line_items,
        cube("Products", "products"),
        cube("Islands", "islands"),
    ])
    .unwrap()
}

fn query(measures: &[&str], dimensions: &[&str]) -> Query {
    Query {
        measures: measures.iter().map(|s| s.to_string()).collect(),
        dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn test_single_cube() {
    let schema = schema();
    let plan = plan_query(&schema, &query(&["Orders.count"], &["Orders.status"])).unwrap();
    assert_eq!(plan.primary.cube, "Orders");
    assert_eq!(plan.primary.reason, SelectionReason::SingleCube);
    assert_eq!(plan.primary.candidates.len(), 1);
    assert_eq!(plan.primary.candidates[0].dimension_count, 1);
}

#[test]
fn test_most_dimensions_wins() {
    let schema = schema();
    let plan = plan_query(
        &schema,
        &query(&["Orders.count"], &["Customers.region", "Customers.name"]),
    )
    .unwrap();
    assert_eq!(plan.primary.cube, "Customers");
    assert_eq!(plan.primary.reason, SelectionReason::MostDimensions);

    let winner = &plan.primary.candidates[0];
    assert_eq!(winner.name, "Customers");
    assert_eq!(winner.dimension_count, 2);
    assert!(winner.reachable);
}

#[test]
fn test_most_connected_wins_on_dimension_tie() {
    let schema = schema();
    // No dimensions anywhere: Orders touches both other cubes directly.
    let plan = plan_query(
        &schema,
        &query(&["Customers.count", "Orders.count", "LineItems.quantity"], &[]),
    )
    .unwrap();
    assert_eq!(plan.primary.cube, "Orders");
    assert_eq!(plan.primary.reason, SelectionReason::MostConnected);
    assert_eq!(plan.primary.candidates[0].join_count, 2);
}

#[test]
fn test_alphabetical_fallback() {
    let schema = schema();
    let plan = plan_query(&schema, &query(&["Customers.count", "Orders.count"], &[])).unwrap();
    // Both have zero requested dimensions and one direct edge into the
    // touched set.
    assert_eq!(plan.primary.cube, "Customers");
    assert_eq!(plan.primary.reason, SelectionReason::AlphabeticalFallback);
}

#[test]
fn test_selection_is_deterministic() {
    let schema = schema();
    let request = query(&["Customers.count", "Orders.count", "LineItems.quantity"], &[]);
    let first = plan_query(&schema, &request).unwrap();
    let second = plan_query(&schema, &request).unwrap();
    assert_eq!(first.primary, second.primary);
    assert_eq!(first.primary.candidates, second.primary.candidates);
}

#[test]
fn test_disconnected_cube_aborts_with_path_error() {
    let schema = schema();
    let err = plan_query(&schema, &query(&["Orders.count", "Islands.count"], &[])).unwrap_err();
    match err {
        CompileError::PathNotFound { from, to, visited } => {
            assert_eq!(from, "Islands");
            assert_eq!(to, "Orders");
            assert!(!visited.is_empty());
        }
        other => panic!("expected PathNotFound, got {other:?}"),
    }
}

#[test]
fn test_unknown_member_aborts() {
    let schema = schema();
    let err = plan_query(&schema, &query(&["Orders.missing"], &[])).unwrap_err();
    assert!(matches!(err, CompileError::UnknownMember(_)));
}
