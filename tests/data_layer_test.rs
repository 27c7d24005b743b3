mod common;

use astro::eval::EvalSuite;
use astro::execution::{QueryOutcome, TableDescription};
use astro::semantic::{EntityType, SemanticRole};
use astro::AstroError;
use common::Warehouse;
use serde_json::{json, Value};

#[test]
fn test_list_schemas_annotates_entities() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let schemas = data.list_schemas().unwrap();
    let names: Vec<&str> = schemas.iter().map(|s| s.schema.as_str()).collect();
    assert!(names.contains(&"raw"));
    assert!(!names.contains(&"information_schema"));
    assert!(!names.contains(&"pg_catalog"));

    let raw = schemas.iter().find(|s| s.schema == "raw").unwrap();
    assert_eq!(raw.entity_count, 2);
    assert_eq!(raw.entities, vec!["orders", "customers"]);
}

#[test]
fn test_list_tables_merges_manifest_and_tolerates_unreadable_view() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let tables = data.list_tables("raw").unwrap();
    let orders = tables.iter().find(|t| t.name == "orders").unwrap();
    assert_eq!(orders.row_count, Some(42));
    let semantics = orders.semantics.as_ref().unwrap();
    assert_eq!(semantics.entity, "orders");
    assert_eq!(semantics.entity_type, EntityType::Fact);
    assert_eq!(semantics.grain, "one order");
    assert_eq!(semantics.metrics, vec!["total_revenue"]);
    assert_eq!(
        semantics.relationships,
        vec!["orders.customer_id -> customers.customer_id (many_to_one)"]
    );

    let events = tables.iter().find(|t| t.name == "events").unwrap();
    assert_eq!(events.table_type, "VIEW");
    assert_eq!(events.row_count, None);

    let big = tables.iter().find(|t| t.name == "big").unwrap();
    assert_eq!(big.row_count, Some(250));
    assert!(big.semantics.is_none());

    // Semantic fields are flattened into the row.
    let as_json = serde_json::to_value(orders).unwrap();
    assert_eq!(as_json["type"], "BASE TABLE");
    assert_eq!(as_json["entity"], "orders");
}

#[test]
fn test_describe_table_envelope_vs_bare_list() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let orders = data.describe_table("raw", "orders").unwrap();
    match &orders {
        TableDescription::Entity {
            entity,
            entity_type,
            primary_key,
            ..
        } => {
            assert_eq!(entity, "orders");
            assert_eq!(*entity_type, EntityType::Fact);
            assert_eq!(primary_key.as_deref(), Some("order_id"));
        }
        other => panic!("expected entity envelope, got {:?}", other),
    }
    let amount = orders.columns().iter().find(|c| c.column == "amount").unwrap();
    assert_eq!(amount.data_type, "DOUBLE");
    assert_eq!(amount.semantic_type, Some(SemanticRole::Measure));
    assert_eq!(amount.description.as_deref(), Some("Order total in USD"));
    assert_eq!(amount.format.as_deref(), Some("currency"));

    let big = data.describe_table("raw", "big").unwrap();
    assert!(matches!(big, TableDescription::Columns(_)));
    let as_json = serde_json::to_value(&big).unwrap();
    assert!(as_json.is_array());
    assert_eq!(as_json[0]["column"], "n");
}

#[test]
fn test_sample_data_clamps_limit() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    assert_eq!(data.sample_data("raw", "big", 50).unwrap().rows.len(), 10);
    assert_eq!(data.sample_data("raw", "big", 0).unwrap().rows.len(), 1);
    assert_eq!(data.sample_data("raw", "big", -3).unwrap().rows.len(), 1);

    let sample = data.sample_data("raw", "orders", 5).unwrap();
    assert_eq!(sample.rows.len(), 5);
    assert_eq!(sample.columns, vec!["order_id", "customer_id", "amount", "status"]);
}

#[test]
fn test_sample_data_rejects_unsafe_identifiers() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    for (schema, table) in [
        ("raw", "orders; DROP TABLE raw.orders"),
        ("raw\"", "orders"),
        ("", "orders"),
        ("raw", "my-table"),
    ] {
        let err = data.sample_data(schema, table, 5).unwrap_err();
        assert!(matches!(err, AstroError::InvalidIdentifier(_)), "{}.{}", schema, table);
    }
}

#[test]
fn test_execute_query_caps_rows_but_keeps_true_count() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    match data.execute_query("SELECT n FROM raw.big ORDER BY n;  \n") {
        QueryOutcome::Rows(result) => {
            assert_eq!(result.rows.len(), 100);
            assert_eq!(result.row_count, 250);
            assert!(result.truncated);
            assert_eq!(
                result.note.as_deref(),
                Some("Showing 100 of 250 rows. Refine your query for full results.")
            );
            assert_eq!(result.rows[99], vec![json!(99)]);
        }
        QueryOutcome::Failed { error } => panic!("query failed: {}", error),
    }

    match data.execute_query("SELECT COUNT(*) AS n FROM raw.orders") {
        QueryOutcome::Rows(result) => {
            assert_eq!(result.columns, vec!["n"]);
            assert_eq!(result.rows, vec![vec![json!(42)]]);
            assert!(!result.truncated);
            assert!(result.note.is_none());
        }
        QueryOutcome::Failed { error } => panic!("query failed: {}", error),
    }
}

#[test]
fn test_execute_query_failures_are_values() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let bad_column = data.execute_query("SELECT nope FROM raw.orders");
    assert!(bad_column.is_failed());
    assert!(bad_column.error().unwrap().contains("nope"));

    assert!(data.execute_query("SELEC 1").is_failed());
    assert!(data.execute_query("SELECT * FROM raw.missing").is_failed());

    // Opened read-only.
    assert!(data.execute_query("CREATE TABLE raw.scratch (i INTEGER)").is_failed());
}

#[test]
fn test_non_finite_floats_serialize_as_null() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let outcome = data.execute_query("SELECT x, y, z FROM raw.floats");
    let as_json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(as_json["rows"], json!([[Value::Null, Value::Null, 1.5]]));

    let sample = data.sample_data("raw", "floats", 1).unwrap();
    assert_eq!(sample.rows[0], vec![Value::Null, Value::Null, json!(1.5)]);
}

#[test]
fn test_non_primitive_values_serialize_readably() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let outcome = data.execute_query(
        "SELECT 2.5 AS d, INTERVAL 1 DAY AS i, {'x': 'nan'::DOUBLE, 'y': 'a'} AS s, [1.0, 'inf'::DOUBLE] AS l",
    );
    let as_json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(as_json["columns"], json!(["d", "i", "s", "l"]));
    assert_eq!(
        as_json["rows"],
        json!([[2.5, "1 day", {"x": null, "y": "a"}, [1.0, null]]])
    );
}

#[test]
fn test_eval_case_verification_sql() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();

    let suite = EvalSuite::from_yaml(
        r#"
cases:
  - id: order_count
    question: How many orders are there?
    verification_sql: SELECT COUNT(*) FROM raw.orders
  - question: No ground truth here
"#,
    )
    .unwrap();

    match suite.cases[0].verify(&data) {
        Some(QueryOutcome::Rows(result)) => assert_eq!(result.rows, vec![vec![json!(42)]]),
        other => panic!("unexpected verification outcome: {:?}", other),
    }
    assert!(suite.cases[1].verify(&data).is_none());
}

#[test]
fn test_close_releases_handle() {
    let warehouse = Warehouse::build();
    let data = warehouse.open();
    data.close().unwrap();

    // Reopening after close works on the same file.
    let reopened = warehouse.open();
    assert!(!reopened.list_tables("raw").unwrap().is_empty());
}
