use std::panic::{self, AssertUnwindSafe};

use super::*;
use crate::collection::FilterValue;
use crate::config::MismatchPolicy;
use crate::engine::memory::{MemoryEngine, MemoryEngineHandle};
use crate::errors::ConnectionError;

const DIMENSIONS: usize = 4;

fn store() -> (VectorStore<MemoryEngine>, MemoryEngineHandle) {
    let engine = MemoryEngine::new();
    let handle = engine.handle();
    let config = StoreConfig::default().with_dimensions(DIMENSIONS);
    (VectorStore::open(engine, config), handle)
}

fn store_with_docs() -> (VectorStore<MemoryEngine>, MemoryEngineHandle) {
    let (store, handle) = store();
    store
        .create_collection("articles", "news articles")
        .expect("create must succeed");
    let documents = vec![
        Document::new("rust release").with_metadata("category", "tech"),
        Document::new("election night").with_metadata("category", "politics"),
        Document::new("new compiler").with_metadata("category", "tech"),
    ];
    let vectors = vec![
        vec![1.0, 0.0, 0.0, 0.0],
        vec![0.0, 1.0, 0.0, 0.0],
        vec![0.9, 0.1, 0.0, 0.0],
    ];
    let report = store
        .add_documents("articles", &documents, vectors)
        .expect("ingestion must succeed");
    assert_eq!(report.inserted(), 3);
    (store, handle)
}

#[test]
fn creating_existing_collection_returns_false() {
    let (store, _handle) = store();
    assert!(store.create_collection("docs", "").expect("first create must succeed"));
    assert!(!store.create_collection("docs", "").expect("second create must not fail"));
}

#[test]
fn created_collection_is_listed() {
    let (store, _handle) = store();
    assert!(store.create_collection("docs", "").expect("create must succeed"));
    assert_eq!(store.list_collections(), vec!["docs".to_string()]);
}

#[test]
fn create_with_empty_name_is_a_schema_error() {
    let (store, _handle) = store();
    let error = store.create_collection("  ", "").expect_err("empty name must fail");
    assert!(matches!(error, SchemaError::Invalid(_)));
}

#[test]
fn wrong_dimension_is_a_per_document_failure() {
    let (store, handle) = store();
    store.create_collection("docs", "").expect("create must succeed");
    let documents = vec![Document::new("ok"), Document::new("short")];
    let vectors = vec![vec![0.5; DIMENSIONS], vec![0.5; DIMENSIONS - 1]];

    let report = store
        .add_documents("docs", &documents, vectors)
        .expect("ingestion must run");
    assert_eq!(report.inserted(), 1);
    assert_eq!(
        report.outcomes[1].result,
        Err(IngestionError::InvalidDimension {
            expected: DIMENSIONS,
            got: DIMENSIONS - 1
        })
    );
    assert_eq!(handle.object_count("docs"), Some(1));
}

#[test]
fn search_on_empty_collection_returns_nothing() {
    let (store, _handle) = store();
    store.create_collection("docs", "").expect("create must succeed");
    let results = store
        .try_search("docs", &[1.0, 0.0, 0.0, 0.0], None, None)
        .expect("search must succeed");
    assert!(results.is_empty());
}

#[test]
fn search_filter_matches_metadata_equality() {
    let (store, _handle) = store_with_docs();
    let mut filters = QueryFilter::new();
    filters.insert("category".to_string(), FilterValue::from("tech"));

    let results = store.search("articles", &[0.0, 1.0, 0.0, 0.0], Some(10), Some(&filters));
    assert_eq!(results.len(), 2);
    for result in &results {
        let metadata = result.parsed_metadata().expect("metadata must decode");
        assert_eq!(metadata["category"], "tech");
    }
}

#[test]
fn deleted_collection_has_no_info() {
    let (store, _handle) = store_with_docs();
    assert!(store.collection_info("articles").is_some());
    assert!(store.delete_collection("articles"));
    assert_eq!(store.collection_info("articles"), None);
    assert!(!store.delete_collection("articles"));
}

#[test]
fn identical_vector_ranks_first_with_zero_distance() {
    let (store, _handle) = store_with_docs();
    let results = store.search("articles", &[0.0, 1.0, 0.0, 0.0], Some(1), None);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "election night");
    let distance = results[0].distance.expect("distance must be reported");
    assert!(distance.abs() < 1e-6);
}

#[test]
fn store_reconnects_after_transport_failure() {
    let (store, handle) = store_with_docs();
    assert_eq!(store.state(), ConnectionState::Connected);

    handle.drop_connection();
    assert_eq!(store.list_collections(), vec!["articles".to_string()]);
    assert_eq!(store.state(), ConnectionState::Connected);
    assert_eq!(handle.connect_count(), 2);
}

#[test]
fn failed_operation_is_recovered_on_next_call() {
    let (store, handle) = store_with_docs();
    handle.fail_next_operations(1);

    assert!(store.list_collections().is_empty());
    assert_eq!(store.state(), ConnectionState::Disconnected);
    assert_eq!(store.list_collections(), vec!["articles".to_string()]);
}

#[test]
fn five_documents_insert_five_records() {
    let (store, handle) = store();
    store.create_collection("docs", "").expect("create must succeed");
    let documents: Vec<Document> = (0..5).map(|i| Document::new(format!("doc {i}"))).collect();
    let vectors = vec![vec![0.25; DIMENSIONS]; 5];

    let report = store
        .add_documents("docs", &documents, vectors)
        .expect("ingestion must succeed");
    assert_eq!(report.inserted(), 5);
    assert_eq!(handle.object_count("docs"), Some(5));
}

#[test]
fn mismatched_lengths_follow_configured_policy() {
    let documents: Vec<Document> = (0..5).map(|i| Document::new(format!("doc {i}"))).collect();

    let (strict, _handle) = store();
    strict.create_collection("docs", "").expect("create must succeed");
    let error = strict
        .add_documents("docs", &documents, vec![vec![0.25; DIMENSIONS]; 3])
        .expect_err("strict store must reject mismatch");
    assert!(matches!(error, IngestionError::LengthMismatch { documents: 5, vectors: 3 }));

    let engine = MemoryEngine::new();
    let handle = engine.handle();
    let config = StoreConfig::default()
        .with_dimensions(DIMENSIONS)
        .with_mismatch_policy(MismatchPolicy::TruncateToShorter);
    let lenient = VectorStore::open(engine, config);
    lenient.create_collection("docs", "").expect("create must succeed");
    let report = lenient
        .add_documents("docs", &documents, vec![vec![0.25; DIMENSIONS]; 3])
        .expect("lenient store must truncate");
    assert_eq!(report.inserted(), 3);
    assert_eq!(handle.object_count("docs"), Some(3));
}

#[test]
fn collection_info_reports_schema() {
    let (store, _handle) = store_with_docs();
    let info = store
        .try_collection_info("articles")
        .expect("info must be available");

    assert_eq!(info.name, "articles");
    assert_eq!(info.description, "news articles");
    assert_eq!(info.dimensions, Some(DIMENSIONS));
    let names: Vec<&str> = info.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["text", "metadata"]);
}

#[test]
fn scoped_store_shuts_down_on_error_and_panic() {
    let engine = MemoryEngine::new();
    let handle = engine.handle();
    let result: Result<(), IngestionError> =
        VectorStore::scoped(engine, StoreConfig::default(), |store| {
            store.add_documents("missing", &[Document::new("x")], vec![vec![0.0; 3]])?;
            Ok(())
        });
    assert!(result.is_err());
    assert_eq!(handle.close_count(), 1);

    let engine = MemoryEngine::new();
    let handle = engine.handle();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        VectorStore::scoped(engine, StoreConfig::default(), |store| {
            store.list_collections();
            panic!("caller failure");
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(handle.close_count(), 1);
}

#[test]
fn operations_after_shutdown_fail_with_closed() {
    let (store, handle) = store();
    assert!(store.shutdown());
    assert!(!store.shutdown());
    assert_eq!(handle.close_count(), 1);

    let error = store
        .try_list_collections()
        .expect_err("closed store must fail");
    assert!(matches!(error, QueryError::Connection(ConnectionError::Closed { .. })));
}
