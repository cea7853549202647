//! GraphQL `Get` queries for nearest-neighbour search and their responses.

use serde::Deserialize;
use serde_json::{Map, Value};
use vecstore_core::{EngineError, Filter, FilterValue, QueryHit, QueryRequest};

const ADDITIONAL_FIELD: &str = "_additional";

/// Class and field names are spliced into the query text, so they must be
/// plain GraphQL names.
pub(crate) fn is_graphql_name(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn build_get_query(class: &str, request: &QueryRequest) -> Result<String, EngineError> {
    if !is_graphql_name(class) {
        return Err(EngineError::Rejected(format!(
            "collection name '{class}' is not a valid class name"
        )));
    }
    if let Some(field) = request
        .return_fields
        .iter()
        .find(|field| !is_graphql_name(field))
    {
        return Err(EngineError::Rejected(format!(
            "return field '{field}' is not a valid field name"
        )));
    }

    let vector = serde_json::to_string(&request.vector)
        .map_err(|error| EngineError::Protocol(error.to_string()))?;
    let mut arguments = format!("nearVector: {{vector: {vector}}}, limit: {}", request.limit);
    if let Some(filter) = &request.filter {
        arguments.push_str(", where: ");
        arguments.push_str(&render_where(filter)?);
    }

    let fields = request.return_fields.join(" ");
    Ok(format!(
        "{{ Get {{ {class}({arguments}) {{ {fields} {ADDITIONAL_FIELD} {{ distance }} }} }} }}"
    ))
}

fn render_where(filter: &Filter) -> Result<String, EngineError> {
    match filter {
        Filter::And(operands) => {
            let rendered = operands
                .iter()
                .map(render_where)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("{{operator: And, operands: [{}]}}", rendered.join(", ")))
        }
        Filter::Equal { path, value } => {
            let path = json_literal(path)?;
            let (kind, literal) = match value {
                FilterValue::String(text) => ("valueText", json_literal(text)?),
                FilterValue::Integer(number) => ("valueInt", number.to_string()),
                FilterValue::Float(number) if number.is_finite() => {
                    ("valueNumber", json_literal(number)?)
                }
                FilterValue::Float(number) => {
                    return Err(EngineError::Rejected(format!(
                        "filter value {number} is not a finite number"
                    )))
                }
                FilterValue::Bool(flag) => ("valueBoolean", flag.to_string()),
            };
            Ok(format!("{{path: {path}, operator: Equal, {kind}: {literal}}}"))
        }
    }
}

fn json_literal<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string(value).map_err(|error| EngineError::Protocol(error.to_string()))
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

pub(crate) fn parse_get_response(class: &str, body: &str) -> Result<Vec<QueryHit>, EngineError> {
    let response: GraphqlResponse = serde_json::from_str(body)
        .map_err(|error| EngineError::Protocol(format!("invalid GraphQL response: {error}")))?;

    if !response.errors.is_empty() {
        let messages: Vec<&str> = response
            .errors
            .iter()
            .map(|error| error.message.as_str())
            .collect();
        return Err(EngineError::Rejected(messages.join("; ")));
    }

    let items = match response
        .data
        .as_ref()
        .and_then(|data| data.get("Get"))
        .and_then(|get| get.get(class))
    {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(EngineError::Protocol(format!(
                "expected a list of objects for {class}, got {other}"
            )))
        }
    };

    Ok(items.iter().map(decode_item).collect())
}

fn decode_item(item: &Value) -> QueryHit {
    let Some(object) = item.as_object() else {
        return QueryHit::default();
    };

    let distance = object
        .get(ADDITIONAL_FIELD)
        .and_then(|additional| additional.get("distance"))
        .and_then(Value::as_f64)
        .map(|distance| distance as f32);
    let properties: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| key.as_str() != ADDITIONAL_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    QueryHit {
        properties: Some(properties),
        distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filter: Option<Filter>) -> QueryRequest {
        QueryRequest {
            vector: vec![1.0, 0.5],
            limit: 3,
            return_fields: vec!["text".to_string(), "metadata".to_string()],
            filter,
        }
    }

    fn equal(key: &str, value: FilterValue) -> Filter {
        Filter::Equal {
            path: vec!["metadata".to_string(), key.to_string()],
            value,
        }
    }

    #[test]
    fn get_query_without_filter() {
        let query = build_get_query("Articles", &request(None)).expect("query");
        assert_eq!(
            query,
            "{ Get { Articles(nearVector: {vector: [1.0,0.5]}, limit: 3) { text metadata _additional { distance } } } }"
        );
    }

    #[test]
    fn get_query_renders_and_of_typed_equalities() {
        let filter = Filter::And(vec![
            equal("category", FilterValue::from("x\"y")),
            equal("year", FilterValue::from(2024_i64)),
            equal("draft", FilterValue::from(false)),
        ]);
        let query = build_get_query("Articles", &request(Some(filter))).expect("query");

        assert!(query.contains("where: {operator: And, operands: ["));
        assert!(query.contains(
            "{path: [\"metadata\",\"category\"], operator: Equal, valueText: \"x\\\"y\"}"
        ));
        assert!(query.contains("operator: Equal, valueInt: 2024}"));
        assert!(query.contains("operator: Equal, valueBoolean: false}"));
    }

    #[test]
    fn get_query_rejects_unsafe_names() {
        let error = build_get_query("Articles) { x", &request(None)).expect_err("must fail");
        assert!(matches!(error, EngineError::Rejected(_)));

        let filter = equal("score", FilterValue::Float(f64::NAN));
        assert!(build_get_query("Articles", &request(Some(filter))).is_err());
    }

    #[test]
    fn response_hits_keep_order_and_distance() {
        let body = r#"{"data":{"Get":{"Articles":[
            {"text":"a","metadata":"{}","_additional":{"distance":0.0}},
            null,
            {"text":"b","metadata":"{}","_additional":{"distance":0.25}}
        ]}}}"#;
        let hits = parse_get_response("Articles", body).expect("hits");

        assert_eq!(hits.len(), 3);
        let first = hits[0].properties.as_ref().expect("properties");
        assert_eq!(first.get("text"), Some(&Value::from("a")));
        assert!(!first.contains_key("_additional"));
        assert_eq!(hits[0].distance, Some(0.0));
        assert_eq!(hits[1].properties, None);
        assert_eq!(hits[2].distance, Some(0.25));
    }

    #[test]
    fn response_errors_are_rejections() {
        let body = r#"{"data":{"Get":{"Articles":null}},"errors":[{"message":"no such class"}]}"#;
        let error = parse_get_response("Articles", body).expect_err("must fail");
        assert_eq!(error, EngineError::Rejected("no such class".to_string()));
    }

    #[test]
    fn missing_class_in_response_is_empty() {
        let hits = parse_get_response("Articles", r#"{"data":{"Get":{}}}"#).expect("hits");
        assert!(hits.is_empty());
    }
}
