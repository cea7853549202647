use serde_json::json;

use super::*;

#[test]
fn document_schema_has_fixed_text_fields() {
    let schema = CollectionSchema::documents("Articles", "news", DEFAULT_DIMENSIONS)
        .expect("schema must be valid");

    assert_eq!(schema.distance, Distance::Cosine);
    assert_eq!(schema.dimensions, Some(1536));
    let names: Vec<&str> = schema.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec![TEXT_FIELD, METADATA_FIELD]);
    assert!(schema
        .properties
        .iter()
        .all(|property| property.data_type == DataType::Text));
    assert!(schema.has_property("metadata"));
    assert!(!schema.has_property("vector"));
}

#[test]
fn rejects_empty_name() {
    let error = CollectionSchema::documents("   ", "", 3).expect_err("must fail");
    assert_eq!(error, SchemaValidationError::InvalidName);
}

#[test]
fn rejects_zero_dimensions() {
    let error = CollectionSchema::documents("demo", "", 0).expect_err("must fail");
    assert_eq!(error, SchemaValidationError::InvalidDimensions(0));
}

#[test]
fn schema_serializes_with_data_type_key() {
    let schema = CollectionSchema::documents("demo", "d", 3).expect("schema must be valid");
    let value = serde_json::to_value(&schema).expect("schema must serialize");
    assert_eq!(value["distance"], "cosine");
    assert_eq!(value["properties"][0]["dataType"], "text");
}

#[test]
fn document_properties_encode_metadata_as_text() {
    let document = Document::new("hello")
        .with_metadata("category", "x")
        .with_metadata("page", 3);
    let properties = document.to_properties().expect("must encode");

    assert_eq!(properties["text"], json!("hello"));
    let blob = properties["metadata"].as_str().expect("metadata must be a string");
    let decoded: Metadata = serde_json::from_str(blob).expect("blob must be json");
    assert_eq!(decoded["category"], json!("x"));
    assert_eq!(decoded["page"], json!(3));
}

#[test]
fn filter_values_match_numbers_across_representations() {
    assert!(FilterValue::Integer(3).matches_json(&json!(3.0)));
    assert!(FilterValue::Float(2.5).matches_json(&json!(2.5)));
    assert!(FilterValue::from("x").matches_json(&json!("x")));
    assert!(FilterValue::from(true).matches_json(&json!(true)));
    assert!(!FilterValue::from("3").matches_json(&json!(3)));
    assert!(!FilterValue::Integer(1).matches_json(&json!(true)));
    assert!(!FilterValue::from("x").matches_json(&json!(["x"])));
}

#[test]
fn filter_values_deserialize_untagged() {
    let filter: QueryFilter =
        serde_json::from_value(json!({"a": "x", "b": 2, "c": 1.5, "d": false}))
            .expect("filter must parse");
    assert_eq!(filter["a"], FilterValue::String("x".into()));
    assert_eq!(filter["b"], FilterValue::Integer(2));
    assert_eq!(filter["c"], FilterValue::Float(1.5));
    assert_eq!(filter["d"], FilterValue::Bool(false));
}

#[test]
fn search_result_parses_metadata_blob() {
    let result = SearchResult {
        text: "t".into(),
        metadata: r#"{"category":"x"}"#.into(),
        distance: Some(0.0),
    };
    let metadata = result.parsed_metadata().expect("must parse");
    assert_eq!(metadata["category"], json!("x"));

    let broken = SearchResult {
        metadata: "not-json".into(),
        ..result
    };
    assert!(broken.parsed_metadata().is_err());
}
