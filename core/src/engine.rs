//! Boundary with the backing vector-search engine.
//!
//! The engine is an opaque remote service: index construction, ANN search and
//! storage all happen behind this trait. Implementations are driven through
//! the [`ConnectionSupervisor`](crate::ConnectionSupervisor), which serializes
//! access, so methods take `&mut self`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection::{CollectionSchema, FilterValue};

pub mod memory;

pub const DEFAULT_BULK_PORT: u16 = 50051;

/// Network location of the engine: a primary RPC port for schema, query and
/// health traffic, and a bulk port for batch inserts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub bulk_port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, bulk_port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            bulk_port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (bulk {})", self.host, self.port, self.bulk_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The session could not reach the engine or lost it mid-request.
    Transport(String),
    AlreadyExists(String),
    NotFound(String),
    /// The engine understood the request and refused it.
    Rejected(String),
    /// The engine answered with something this client cannot decode.
    Protocol(String),
    Closed,
}

impl EngineError {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::AlreadyExists(name) => write!(f, "collection '{name}' already exists"),
            Self::NotFound(name) => write!(f, "collection '{name}' not found"),
            Self::Rejected(message) => write!(f, "rejected by engine: {message}"),
            Self::Protocol(message) => write!(f, "unexpected engine response: {message}"),
            Self::Closed => write!(f, "engine session is closed"),
        }
    }
}

impl std::error::Error for EngineError {}

/// One object submitted in a bulk insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineObject {
    pub properties: Map<String, Value>,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    And(Vec<Filter>),
    Equal { path: Vec<String>, value: FilterValue },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub return_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

/// Raw hit as returned by the engine. Hits without a property surface are
/// engine-side noise and are skipped by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub distance: Option<f32>,
}

/// Per-object outcome of a bulk insert, aligned with the submitted objects.
pub type BatchOutcome = Vec<Result<(), EngineError>>;

pub trait Engine: Send {
    fn endpoint(&self) -> &Endpoint;

    fn connect(&mut self) -> Result<(), EngineError>;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> Result<(), EngineError>;

    fn create_collection(&mut self, schema: &CollectionSchema) -> Result<(), EngineError>;

    fn delete_collection(&mut self, name: &str) -> Result<(), EngineError>;

    /// The outer error means the whole request failed; inner errors are
    /// attributable to the object at the same index.
    fn insert_batch(
        &mut self,
        collection: &str,
        objects: &[EngineObject],
    ) -> Result<BatchOutcome, EngineError>;

    fn query(
        &mut self,
        collection: &str,
        request: &QueryRequest,
    ) -> Result<Vec<QueryHit>, EngineError>;

    fn list_collections(&mut self) -> Result<Vec<String>, EngineError>;

    fn describe_collection(&mut self, name: &str) -> Result<CollectionSchema, EngineError>;
}
