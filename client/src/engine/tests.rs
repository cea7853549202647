use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use vecstore_core::{Document, Filter, FilterValue, IngestionError, StoreConfig, VectorStore};

use super::*;

/// Serves one canned response per accepted connection and returns the
/// request lines it saw.
fn serve(responses: Vec<String>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener must bind");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().expect("accept must succeed");
            seen.push(read_request(&mut stream));
            stream
                .write_all(response.as_bytes())
                .expect("response must be written");
        }
        seen
    });
    (port, handle)
}

fn read_request(stream: &mut std::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let read = stream.read(&mut chunk).expect("request must be readable");
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
        let text = String::from_utf8_lossy(&buffer);
        if let Some(split) = text.find("\r\n\r\n") {
            let content_length = text[..split]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= split + 4 + content_length {
                break;
            }
        }
    }
    let text = String::from_utf8_lossy(&buffer).into_owned();
    text.lines().next().unwrap_or_default().to_string()
}

fn response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn schema() -> CollectionSchema {
    CollectionSchema::documents("Articles", "news", 3).expect("schema must be valid")
}

#[test]
fn endpoint_uses_primary_and_bulk_ports() {
    let engine = HttpEngine::with_options("http://engine.local:8080", 50052, ClientOptions::default())
        .expect("engine must build");
    assert_eq!(engine.endpoint().to_string(), "engine.local:8080 (bulk 50052)");
    assert!(!engine.is_connected());
}

#[test]
fn schema_payload_declares_cosine_index_and_text_properties() {
    let payload = schema_payload(&schema());

    assert_eq!(payload["class"], "Articles");
    assert_eq!(payload["vectorizer"], "none");
    assert_eq!(payload["vectorIndexType"], "hnsw");
    assert_eq!(payload["vectorIndexConfig"]["distance"], "cosine");
    assert_eq!(payload["dimensions"], 3);
    assert_eq!(payload["properties"][0]["name"], "text");
    assert_eq!(payload["properties"][1]["name"], "metadata");
    assert_eq!(payload["properties"][1]["dataType"], json!(["text"]));
}

#[test]
fn batch_payload_tags_every_object_with_its_class() {
    let properties = Document::new("hello")
        .with_metadata("lang", "en")
        .to_properties()
        .expect("properties must encode");
    let objects = vec![EngineObject {
        properties,
        vector: vec![0.5, 0.25, 0.0],
    }];

    let payload = batch_payload("Articles", &objects);
    let first = &payload["objects"][0];
    assert_eq!(first["class"], "Articles");
    assert_eq!(first["properties"]["metadata"], "{\"lang\":\"en\"}");
    assert_eq!(first["vector"], json!([0.5, 0.25, 0.0]));
}

#[test]
fn described_class_round_trips_into_schema() {
    let class: WireClass =
        serde_json::from_value(schema_payload(&schema())).expect("class must decode");
    assert_eq!(class.into_schema().expect("schema must convert"), schema());
}

#[test]
fn described_class_without_dimensions_still_converts() {
    let class: WireClass = serde_json::from_value(json!({
        "class": "Articles",
        "description": "news",
        "vectorIndexConfig": {"distance": "cosine"},
        "properties": [
            {"name": "text", "dataType": ["text"]},
            {"name": "metadata", "dataType": ["text"]}
        ]
    }))
    .expect("class must decode");

    let schema = class.into_schema().expect("schema must convert");
    assert_eq!(schema.name, "Articles");
    assert_eq!(schema.description, "news");
    assert_eq!(schema.dimensions, None);
    assert!(schema.has_property("metadata"));
}

#[test]
fn batch_item_errors_become_rejections() {
    let items: Vec<WireBatchItem> = serde_json::from_value(json!([
        {"result": {}},
        {"result": {"errors": {"error": [{"message": "vector lengths don't match"}]}}},
        {}
    ]))
    .expect("items must decode");

    let outcomes: Vec<_> = items.into_iter().map(WireBatchItem::into_outcome).collect();
    assert_eq!(outcomes[0], Ok(()));
    assert_eq!(
        outcomes[1],
        Err(EngineError::Rejected("vector lengths don't match".to_string()))
    );
    assert_eq!(outcomes[2], Ok(()));
}

#[test]
fn requests_before_connect_are_transport_errors() {
    let mut engine = HttpEngine::new("http://127.0.0.1:1").expect("engine must build");
    let error = engine.list_collections().expect_err("must fail");
    assert!(error.is_transport());
}

#[test]
fn http_statuses_map_onto_engine_errors() {
    let mut engine = HttpEngine::new("http://127.0.0.1:8080").expect("engine must build");
    let http = |status: u16, body: &str| ClientError::Http {
        status,
        call: format!("POST {SCHEMA_PATH}"),
        body: body.to_string(),
    };

    assert_eq!(
        engine.engine_error(http(422, "class name \"Articles\" already exists"), "Articles"),
        EngineError::AlreadyExists("Articles".to_string())
    );
    assert_eq!(
        engine.engine_error(http(404, ""), "Articles"),
        EngineError::NotFound("Articles".to_string())
    );
    assert!(matches!(
        engine.engine_error(http(422, "invalid property"), "Articles"),
        EngineError::Rejected(_)
    ));
}

#[test]
fn connect_then_create_and_list_over_http() {
    let (port, server) = serve(vec![
        response("200 OK", ""),
        response("200 OK", "{}"),
        response(
            "422 Unprocessable Entity",
            r#"{"error":[{"message":"class name Articles already exists"}]}"#,
        ),
        response("200 OK", r#"{"classes":[{"class":"Articles"},{"class":"Notes"}]}"#),
    ]);
    let mut engine =
        HttpEngine::new(format!("http://127.0.0.1:{port}")).expect("engine must build");

    engine.connect().expect("ready probe must succeed");
    assert!(engine.is_connected());
    engine
        .create_collection(&schema())
        .expect("create must succeed");
    assert_eq!(
        engine.create_collection(&schema()),
        Err(EngineError::AlreadyExists("Articles".to_string()))
    );
    assert_eq!(
        engine.list_collections().expect("list must succeed"),
        vec!["Articles".to_string(), "Notes".to_string()]
    );

    let seen = server.join().expect("server must finish");
    assert_eq!(seen[0], "GET /v1/.well-known/ready HTTP/1.1");
    assert_eq!(seen[1], "POST /v1/schema HTTP/1.1");
    assert_eq!(seen[3], "GET /v1/schema HTTP/1.1");
}

#[test]
fn query_over_http_decodes_hits() {
    let (port, server) = serve(vec![
        response("200 OK", ""),
        response(
            "200 OK",
            r#"{"data":{"Get":{"Articles":[{"text":"a","metadata":"{}","_additional":{"distance":0.5}}]}}}"#,
        ),
    ]);
    let mut engine =
        HttpEngine::new(format!("http://127.0.0.1:{port}")).expect("engine must build");
    engine.connect().expect("ready probe must succeed");

    let request = QueryRequest {
        vector: vec![1.0, 0.0, 0.0],
        limit: 1,
        return_fields: vec!["text".to_string(), "metadata".to_string()],
        filter: Some(Filter::Equal {
            path: vec!["metadata".to_string(), "lang".to_string()],
            value: FilterValue::from("en"),
        }),
    };
    let hits = engine.query("Articles", &request).expect("query must succeed");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].distance, Some(0.5));
    let seen = server.join().expect("server must finish");
    assert_eq!(seen[1], "POST /v1/graphql HTTP/1.1");
}

#[test]
fn refused_connection_leaves_engine_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener must bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let mut engine =
        HttpEngine::new(format!("http://127.0.0.1:{port}")).expect("engine must build");
    let error = engine.connect().expect_err("connect must fail");
    assert!(error.is_transport());
    assert!(!engine.is_connected());
}

#[test]
fn store_describes_and_fills_collection_without_reported_dimensions() {
    let described = r#"{"class":"Articles","description":"news","vectorIndexConfig":{"distance":"cosine"},"properties":[{"name":"text","dataType":["text"]},{"name":"metadata","dataType":["text"]}]}"#;
    let (port, server) = serve(vec![
        response("200 OK", ""),
        response("200 OK", described),
        response("200 OK", described),
        response("200 OK", r#"[{"result":{}},{"result":{}}]"#),
    ]);
    let engine = HttpEngine::with_options(
        format!("http://127.0.0.1:{port}"),
        port,
        ClientOptions::default(),
    )
    .expect("engine must build");
    let store = VectorStore::open(engine, StoreConfig::default().with_dimensions(3));

    let info = store
        .collection_info("Articles")
        .expect("existing collection must be described");
    assert_eq!(info.description, "news");
    assert_eq!(info.dimensions, None);
    assert_eq!(info.properties.len(), 2);

    let documents = vec![
        Document::new("a"),
        Document::new("b"),
        Document::new("c"),
    ];
    let report = store
        .add_documents(
            "Articles",
            &documents,
            vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0, 0.0]],
        )
        .expect("ingestion must run");
    assert_eq!(report.inserted(), 2);
    assert_eq!(
        report.outcomes[1].result,
        Err(IngestionError::InvalidDimension {
            expected: 3,
            got: 2
        })
    );
    store.shutdown();

    let seen = server.join().expect("server must finish");
    assert_eq!(seen[1], "GET /v1/schema/Articles HTTP/1.1");
    assert_eq!(seen[3], "POST /v1/batch/objects HTTP/1.1");
}
