use std::error::Error;
use std::fmt;

use crate::collection::SchemaValidationError;
use crate::engine::EngineError;

/// A session to the engine could not be established or restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    Connect {
        endpoint: String,
        source: EngineError,
    },
    Closed {
        endpoint: String,
    },
    Poisoned,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { endpoint, source } => {
                write!(f, "failed to connect to {endpoint}: {source}")
            }
            Self::Closed { endpoint } => write!(f, "session to {endpoint} has been shut down"),
            Self::Poisoned => write!(f, "connection supervisor lock poisoned"),
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connect { source, .. } => Some(source),
            Self::Closed { .. } | Self::Poisoned => None,
        }
    }
}

/// Collection creation failed for a reason other than "already exists".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Invalid(SchemaValidationError),
    Connection(ConnectionError),
    Engine {
        collection: String,
        source: EngineError,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(error) => write!(f, "invalid collection schema: {error}"),
            Self::Connection(error) => write!(f, "{error}"),
            Self::Engine { collection, source } => {
                write!(f, "schema operation on '{collection}' failed: {source}")
            }
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(error) => Some(error),
            Self::Connection(error) => Some(error),
            Self::Engine { source, .. } => Some(source),
        }
    }
}

impl From<ConnectionError> for SchemaError {
    fn from(error: ConnectionError) -> Self {
        Self::Connection(error)
    }
}

impl From<SchemaValidationError> for SchemaError {
    fn from(error: SchemaValidationError) -> Self {
        Self::Invalid(error)
    }
}

/// Ingestion failure. Call-level variants abort `add_documents`; the rest are
/// attributed to a single document in an [`IngestReport`](crate::IngestReport).
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionError {
    LengthMismatch { documents: usize, vectors: usize },
    UnknownCollection { name: String, source: EngineError },
    Connection(ConnectionError),
    InvalidDimension { expected: usize, got: usize },
    NonFiniteValue { index: usize },
    Serialization(String),
    Rejected(String),
    ConnectionLost(String),
    NotSubmitted,
}

impl fmt::Display for IngestionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthMismatch { documents, vectors } => write!(
                f,
                "documents and vectors must have the same length, got {documents} documents and {vectors} vectors"
            ),
            Self::UnknownCollection { name, source } => {
                write!(f, "cannot ingest into '{name}': {source}")
            }
            Self::Connection(error) => write!(f, "{error}"),
            Self::InvalidDimension { expected, got } => {
                write!(f, "invalid vector dimension: expected {expected}, got {got}")
            }
            Self::NonFiniteValue { index } => {
                write!(f, "vector contains non-finite value at index {index}")
            }
            Self::Serialization(message) => write!(f, "metadata serialization failed: {message}"),
            Self::Rejected(message) => write!(f, "{message}"),
            Self::ConnectionLost(message) => write!(f, "connection lost during batch: {message}"),
            Self::NotSubmitted => write!(f, "not submitted: ingestion aborted after connection loss"),
        }
    }
}

impl Error for IngestionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownCollection { source, .. } => Some(source),
            Self::Connection(error) => Some(error),
            _ => None,
        }
    }
}

impl From<ConnectionError> for IngestionError {
    fn from(error: ConnectionError) -> Self {
        Self::Connection(error)
    }
}

/// Failure of search, list or describe. The masking operations log these and
/// return an empty result instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    Connection(ConnectionError),
    InvalidLimit,
    InvalidFilterKey,
    Engine(EngineError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(error) => write!(f, "{error}"),
            Self::InvalidLimit => write!(f, "limit must be a positive integer"),
            Self::InvalidFilterKey => write!(f, "filter keys must not be empty"),
            Self::Engine(error) => write!(f, "{error}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(error) => Some(error),
            Self::Engine(error) => Some(error),
            Self::InvalidLimit | Self::InvalidFilterKey => None,
        }
    }
}

impl From<ConnectionError> for QueryError {
    fn from(error: ConnectionError) -> Self {
        Self::Connection(error)
    }
}

impl From<EngineError> for QueryError {
    fn from(error: EngineError) -> Self {
        Self::Engine(error)
    }
}
