use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Embedding width used for newly created collections unless configured otherwise.
pub const DEFAULT_DIMENSIONS: usize = 1536;

pub const TEXT_FIELD: &str = "text";
pub const METADATA_FIELD: &str = "metadata";

/// Structured document metadata; serialized to a JSON text blob on ingestion.
pub type Metadata = Map<String, Value>;

/// Equality predicates on metadata keys, implicitly ANDed.
pub type QueryFilter = BTreeMap<String, FilterValue>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    #[serde(default)]
    pub description: String,
}

impl Property {
    pub fn text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::Text,
            description: description.into(),
        }
    }
}

/// Fixed schema of a collection. Immutable once created: changing it
/// requires delete + recreate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub distance: Distance,
    /// Vector length. Engines are not required to report it when describing
    /// an existing collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    pub properties: Vec<Property>,
}

impl CollectionSchema {
    /// Document collection layout: a `text` field and a JSON-encoded
    /// `metadata` field, both stored as text.
    pub fn documents(
        name: impl Into<String>,
        description: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, SchemaValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchemaValidationError::InvalidName);
        }
        if dimensions == 0 {
            return Err(SchemaValidationError::InvalidDimensions(dimensions));
        }

        Ok(Self {
            name,
            description: description.into(),
            distance: Distance::Cosine,
            dimensions: Some(dimensions),
            properties: vec![
                Property::text(TEXT_FIELD, "The text content"),
                Property::text(
                    METADATA_FIELD,
                    "Document metadata (stored as JSON string)",
                ),
            ],
        })
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|property| property.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaValidationError {
    InvalidName,
    InvalidDimensions(usize),
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "collection name must not be empty"),
            Self::InvalidDimensions(dimensions) => {
                write!(f, "dimensions must be > 0, got {dimensions}")
            }
        }
    }
}

impl std::error::Error for SchemaValidationError {}

/// Description of an existing collection as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub description: String,
    pub distance: Distance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    pub properties: Vec<Property>,
}

impl From<CollectionSchema> for CollectionInfo {
    fn from(schema: CollectionSchema) -> Self {
        Self {
            name: schema.name,
            description: schema.description,
            distance: schema.distance,
            dimensions: schema.dimensions,
            properties: schema.properties,
        }
    }
}

/// A unit of ingestion: text plus arbitrary structured metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stored record shape: `{text, metadata}` where metadata is a JSON string.
    pub fn to_properties(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let metadata = serde_json::to_string(&self.metadata)?;
        let mut properties = Map::new();
        properties.insert(TEXT_FIELD.into(), Value::String(self.text.clone()));
        properties.insert(METADATA_FIELD.into(), Value::String(metadata));
        Ok(properties)
    }
}

/// Engine-indexable primitive accepted as a filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl FilterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::String(_) | Self::Bool(_) => None,
        }
    }

    /// Compares against a decoded JSON value; numbers match across
    /// integer/float representations.
    pub fn matches_json(&self, actual: &Value) -> bool {
        match (self, actual) {
            (Self::String(expected), Value::String(actual)) => expected == actual,
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            (Self::Integer(_) | Self::Float(_), Value::Number(actual)) => {
                match (self.as_f64(), actual.as_f64()) {
                    (Some(expected), Some(actual)) => expected == actual,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A decoded search hit, closest first as ranked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    /// Raw JSON text blob as stored.
    pub metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn parsed_metadata(&self) -> Result<Metadata, serde_json::Error> {
        serde_json::from_str(&self.metadata)
    }
}

#[cfg(test)]
mod tests;
