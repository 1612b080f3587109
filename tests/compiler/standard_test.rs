use cubist::compiler::{compile_compare_ranges, compile_standard};
use cubist::error::CompileError;
use cubist::planner::SelectionReason;
use cubist::query::{
    DateRange, FilterCondition, FilterNode, FilterOperator, Granularity, Query, SortDirection,
    TimeDimension,
};
use cubist::schema::{
    Aggregation, Cube, Dimension, JoinColumn, Junction, Measure, Relationship, RelationshipKind,
    Schema, ValueType,
};
use cubist::sql::Dialect;
use serde_json::json;

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
            Measure {
                name: "avgValue".into(),
                aggregation: Aggregation::Avg,
                column: Some("amount".into()),
                value_type: ValueType::Number,
            },
        ],
        dimensions: vec![
            Dimension {
                name: "status".into(),
                column: None,
                value_type: ValueType::String,
            },
            Dimension {
                name: "createdAt".into(),
                column: Some("created_at".into()),
                value_type: ValueType::Time,
            },
        ],
        relationships: vec![],
    };

    let segments = Cube {
        name: "Segments".into(),
        title: None,
        table: "segments".into(),
        schema: None,
        measures: vec![],
        dimensions: vec![Dimension {
            name: "name".into(),
            column: None,
            value_type: ValueType::String,
        }],
        relationships: vec![],
    };

    Schema::load(vec![customers, orders, segments]).unwrap()
}

#[test]
fn test_single_cube_aggregation() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.count".into()],
        dimensions: vec!["Orders.status".into()],
        ..Default::default()
    };

    let compiled = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert!(compiled.sql.contains("\"orders\".\"status\" AS \"orders__status\""));
    assert!(compiled.sql.contains("COUNT(*) AS \"orders__count\""));
    assert!(compiled.sql.contains("FROM \"orders\" AS \"orders\""));
    assert!(compiled.sql.contains("GROUP BY \"orders\".\"status\""));
    assert!(compiled.params.is_empty());
    assert_eq!(compiled.analysis.primary_cube, "Orders");
    assert_eq!(
        compiled.analysis.selection_reason,
        SelectionReason::SingleCube
    );
}

#[test]
fn test_compilation_is_deterministic() {
    let schema = schema();
    let query = Query {
        measures: vec!["Customers.count".into(), "Orders.revenue".into()],
        dimensions: vec!["Customers.region".into()],
        filters: Some(FilterNode::Condition(FilterCondition {
            member: "Customers.region".into(),
            operator: FilterOperator::Equals,
            values: vec![json!("emea")],
        })),
        ..Default::default()
    };

    let first = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    let second = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.params, second.params);
}

#[test]
fn test_fan_out_measure_compiles_through_cte() {
    let schema = schema();
    let query = Query {
        measures: vec!["Customers.count".into(), "Orders.revenue".into()],
        dimensions: vec!["Customers.region".into()],
        ..Default::default()
    };

    let compiled = compile_standard(&schema, &query, Dialect::Postgres).unwrap();

    // Structural fan-out invariant: the hasMany measure is aggregated in a
    // CTE before the join, and the outer query re-aggregates the partial.
    assert!(compiled.sql.starts_with("WITH \"orders_agg\" AS ("));
    assert!(compiled.sql.contains("GROUP BY \"orders\".\"customer_id\""));
    assert!(compiled
        .sql
        .contains("SUM(\"orders_agg\".\"orders__revenue\") AS \"orders__revenue\""));
    // The unfiltered lookup stays LEFT so customers without orders survive.
    assert!(compiled
        .sql
        .contains("LEFT JOIN \"orders_agg\" ON \"customers\".\"id\" = \"orders_agg\".\"customer_id\""));

    let analysis = &compiled.analysis;
    assert_eq!(analysis.pre_aggregations.len(), 1);
    assert_eq!(analysis.pre_aggregations[0].cube, "Orders");
    assert_eq!(analysis.summary.cte_count, 1);
    assert_eq!(analysis.summary.cube_count, 2);
    assert_eq!(analysis.join_paths.len(), 1);
    assert_eq!(analysis.join_paths[0].target, "Orders");
}

#[test]
fn test_avg_partials_recombine_exactly() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.avgValue".into()],
        dimensions: vec!["Customers.region".into()],
        ..Default::default()
    };

    let compiled = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert!(compiled.sql.contains("AS \"orders__avg_value_sum\""));
    assert!(compiled.sql.contains("AS \"orders__avg_value_count\""));
    assert!(compiled.sql.contains(
        "SUM(\"orders_agg\".\"orders__avg_value_sum\") / \
         NULLIF(SUM(\"orders_agg\".\"orders__avg_value_count\"), 0)"
    ));
}

#[test]
fn test_time_granularity_truncates_at_compile_time() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.revenue".into()],
        time_dimensions: vec![TimeDimension {
            dimension: "Orders.createdAt".into(),
            granularity: Some(Granularity::Month),
            date_range: None,
            compare_date_range: vec![],
        }],
        ..Default::default()
    };

    let pg = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert!(pg
        .sql
        .contains("DATE_TRUNC('month', \"orders\".\"created_at\") AS \"orders__created_at_month\""));
    assert!(pg.sql.contains("GROUP BY DATE_TRUNC('month'"));

    let mysql = compile_standard(&schema, &query, Dialect::MySql).unwrap();
    assert!(mysql
        .sql
        .contains("DATE_FORMAT(`orders`.`created_at`, '%Y-%m-01')"));
}

#[test]
fn test_filters_bind_positional_params() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.revenue".into()],
        dimensions: vec!["Orders.status".into()],
        filters: Some(FilterNode::And {
            and: vec![
                FilterNode::Condition(FilterCondition {
                    member: "Orders.status".into(),
                    operator: FilterOperator::In,
                    values: vec![json!("shipped"), json!("delivered")],
                }),
                FilterNode::Condition(FilterCondition {
                    member: "Orders.revenue".into(),
                    operator: FilterOperator::Gt,
                    values: vec![json!(100)],
                }),
            ],
        }),
        order: vec![("Orders.revenue".into(), SortDirection::Desc)],
        limit: Some(50),
        ..Default::default()
    };

    let compiled = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert!(compiled.sql.contains("WHERE \"orders\".\"status\" IN ($1, $2)"));
    // The measure condition lands in HAVING, bound after the WHERE params.
    assert!(compiled
        .sql
        .contains("HAVING SUM(\"orders\".\"amount\") > $3"));
    assert!(compiled.sql.contains("ORDER BY \"orders__revenue\" DESC"));
    assert!(compiled.sql.contains("LIMIT 50"));
    assert_eq!(
        compiled.params,
        vec![json!("shipped"), json!("delivered"), json!(100)]
    );
}

#[test]
fn test_date_range_filters_raw_column() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.revenue".into()],
        time_dimensions: vec![TimeDimension {
            dimension: "Orders.createdAt".into(),
            granularity: Some(Granularity::Day),
            date_range: Some(DateRange::Absolute([
                "2024-01-01".into(),
                "2024-02-01".into(),
            ])),
            compare_date_range: vec![],
        }],
        ..Default::default()
    };

    let compiled = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert!(compiled
        .sql
        .contains("\"orders\".\"created_at\" BETWEEN $1 AND $2"));
    assert_eq!(compiled.params, vec![json!("2024-01-01"), json!("2024-02-01")]);
}

#[test]
fn test_junction_join_expands_through_junction_table() {
    let schema = schema();
    let query = Query {
        measures: vec!["Customers.count".into()],
        dimensions: vec!["Customers.region".into(), "Segments.name".into()],
        ..Default::default()
    };

    let compiled = compile_standard(&schema, &query, Dialect::Postgres).unwrap();
    assert_eq!(compiled.analysis.primary_cube, "Customers");
    assert!(compiled.sql.contains(
        "INNER JOIN \"customer_segments\" AS \"customer_segments\" \
         ON \"customers\".\"id\" = \"customer_segments\".\"customer_id\""
    ));
    assert!(compiled.sql.contains(
        "INNER JOIN \"segments\" AS \"segments\" \
         ON \"customer_segments\".\"segment_id\" = \"segments\".\"id\""
    ));
    assert_eq!(compiled.analysis.summary.join_count, 2);
}

#[test]
fn test_compare_ranges_compile_one_variant_each() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.revenue".into()],
        time_dimensions: vec![TimeDimension {
            dimension: "Orders.createdAt".into(),
            granularity: Some(Granularity::Month),
            date_range: Some(DateRange::Absolute([
                "2024-03-01".into(),
                "2024-04-01".into(),
            ])),
            compare_date_range: vec![
                DateRange::Absolute(["2024-01-01".into(), "2024-02-01".into()]),
                DateRange::Absolute(["2024-02-01".into(), "2024-03-01".into()]),
            ],
        }],
        ..Default::default()
    };

    let variants = compile_compare_ranges(&schema, &query, Dialect::Postgres).unwrap();
    assert_eq!(variants.len(), 2);
    assert_eq!(
        variants[0].params,
        vec![json!("2024-01-01"), json!("2024-02-01")]
    );
    assert_eq!(
        variants[1].params,
        vec![json!("2024-02-01"), json!("2024-03-01")]
    );
    assert_eq!(variants[0].sql, variants[1].sql);
}

#[test]
fn test_empty_query_is_rejected() {
    let schema = schema();
    let err = compile_standard(&schema, &Query::default(), Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::IncompleteSpec(_)));
}

#[test]
fn test_unknown_order_field_is_rejected() {
    let schema = schema();
    let query = Query {
        measures: vec!["Orders.revenue".into()],
        order: vec![("Orders.status".into(), SortDirection::Asc)],
        ..Default::default()
    };
    let err = compile_standard(&schema, &query, Dialect::Postgres).unwrap_err();
    assert!(matches!(err, CompileError::UnknownMember(_)));
}
