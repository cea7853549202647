#![forbid(unsafe_code)]
//! Client-side vector collection store.
//!
//! Manages named collections of embedding vectors with their text and
//! metadata on top of a remote vector-search engine, reached through the
//! [`Engine`] trait. All engine traffic goes through one supervised session;
//! see [`ConnectionSupervisor`]. [`VectorStore`] is the usual entry point.

pub mod collection;
pub mod config;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod ingest;
pub mod query;
pub mod schema;
pub mod store;
pub mod supervisor;
pub mod vector;

pub use collection::{
    CollectionInfo, CollectionSchema, DataType, Distance, Document, FilterValue, Metadata,
    Property, QueryFilter, SchemaValidationError, SearchResult, DEFAULT_DIMENSIONS,
    METADATA_FIELD, TEXT_FIELD,
};
pub use config::{BatchPolicy, MismatchPolicy, StoreConfig, DEFAULT_SEARCH_LIMIT};
pub use directory::CollectionDirectory;
pub use engine::memory::{MemoryEngine, MemoryEngineHandle};
pub use engine::{
    BatchOutcome, Endpoint, Engine, EngineError, EngineObject, Filter, QueryHit, QueryRequest,
    DEFAULT_BULK_PORT,
};
pub use errors::{ConnectionError, IngestionError, QueryError, SchemaError};
pub use ingest::{BatchWriter, DocumentOutcome, IngestReport, IngestionBatcher};
pub use query::QueryComposer;
pub use schema::SchemaManager;
pub use store::VectorStore;
pub use supervisor::{ConnectionState, ConnectionSupervisor, Session};
pub use vector::{cosine_distance, cosine_similarity, CosineQuery, VectorError};
