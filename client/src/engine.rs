//! [`Engine`] over the engine's REST and GraphQL API.
//!
//! Schema, query and health traffic go to the primary port; bulk inserts go
//! to the bulk port on the same host. Every request opens its own TCP
//! connection, so "connected" here means the last readiness probe succeeded
//! and no request has since failed at the transport level.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use vecstore_core::{
    BatchOutcome, CollectionSchema, DataType, Distance, Endpoint, Engine, EngineError,
    EngineObject, Property, QueryHit, QueryRequest, DEFAULT_BULK_PORT,
};

use crate::graphql::{build_get_query, parse_get_response};
use crate::transport::{
    deserialize_json, escape_segment, parse_base_url, transport_error, ClientError, ClientOptions,
    HttpTransport,
};

const READY_PATH: &str = "/v1/.well-known/ready";
const SCHEMA_PATH: &str = "/v1/schema";
const BATCH_PATH: &str = "/v1/batch/objects";
const GRAPHQL_PATH: &str = "/v1/graphql";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Port {
    Primary,
    Bulk,
}

#[derive(Debug, Clone)]
pub struct HttpEngine {
    endpoint: Endpoint,
    primary: HttpTransport,
    bulk: HttpTransport,
    connected: bool,
}

impl HttpEngine {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Self::with_options(base_url, DEFAULT_BULK_PORT, ClientOptions::default())
    }

    pub fn with_options(
        base_url: impl AsRef<str>,
        bulk_port: u16,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let primary_url = parse_base_url(base_url.as_ref())?;
        let mut bulk_url = primary_url.clone();
        bulk_url.port = bulk_port;

        Ok(Self {
            endpoint: Endpoint::new(primary_url.host.clone(), primary_url.port, bulk_port),
            primary: HttpTransport::new(primary_url, &options),
            bulk: HttpTransport::new(bulk_url, &options),
            connected: false,
        })
    }

    fn send(
        &mut self,
        port: Port,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, ClientError> {
        if !self.connected {
            return Err(transport_error(
                &format!("{method} {path}"),
                std::io::Error::new(std::io::ErrorKind::NotConnected, "not connected"),
            ));
        }
        let transport = match port {
            Port::Primary => &self.primary,
            Port::Bulk => &self.bulk,
        };
        transport.request(method, path, body)
    }

    /// Maps a client failure onto the engine taxonomy. Transport failures
    /// drop the session so the supervisor reconnects on the next acquire.
    fn engine_error(&mut self, error: ClientError, collection: &str) -> EngineError {
        match error {
            ClientError::Transport { .. } => {
                if self.connected {
                    warn!(endpoint = %self.endpoint, %error, "engine transport failure");
                }
                self.connected = false;
                EngineError::Transport(error.to_string())
            }
            ClientError::Http { status: 404, .. } => EngineError::NotFound(collection.to_string()),
            ClientError::Http {
                status: 409 | 422,
                ref body,
                ..
            } if body.to_ascii_lowercase().contains("already exists") => {
                EngineError::AlreadyExists(collection.to_string())
            }
            ClientError::Http { .. } | ClientError::InvalidOption(_) => {
                EngineError::Rejected(error.to_string())
            }
            ClientError::InvalidJson { .. } => EngineError::Protocol(error.to_string()),
        }
    }

    fn call<T: serde::de::DeserializeOwned>(
        &mut self,
        port: Port,
        method: &str,
        path: &str,
        body: Option<&Value>,
        collection: &str,
    ) -> Result<T, EngineError> {
        let payload = match self.send(port, method, path, body) {
            Ok(payload) => payload,
            Err(error) => return Err(self.engine_error(error, collection)),
        };
        deserialize_json(&format!("{method} {path}"), payload)
            .map_err(|error| self.engine_error(error, collection))
    }

    fn call_unit(
        &mut self,
        method: &str,
        path: &str,
        body: Option<&Value>,
        collection: &str,
    ) -> Result<(), EngineError> {
        self.send(Port::Primary, method, path, body)
            .map(|_| ())
            .map_err(|error| self.engine_error(error, collection))
    }
}

impl Engine for HttpEngine {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn connect(&mut self) -> Result<(), EngineError> {
        match self.primary.request("GET", READY_PATH, None) {
            Ok(_) => {
                self.connected = true;
                info!(endpoint = %self.endpoint, "engine is ready");
                Ok(())
            }
            Err(error @ ClientError::Transport { .. }) => {
                self.connected = false;
                Err(EngineError::Transport(error.to_string()))
            }
            Err(error) => {
                self.connected = false;
                Err(EngineError::Transport(format!("engine not ready: {error}")))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.connected = false;
        Ok(())
    }

    fn create_collection(&mut self, schema: &CollectionSchema) -> Result<(), EngineError> {
        let body = schema_payload(schema);
        self.call_unit("POST", SCHEMA_PATH, Some(&body), &schema.name)
    }

    fn delete_collection(&mut self, name: &str) -> Result<(), EngineError> {
        let path = class_path(name);
        self.call_unit("DELETE", &path, None, name)
    }

    fn insert_batch(
        &mut self,
        collection: &str,
        objects: &[EngineObject],
    ) -> Result<BatchOutcome, EngineError> {
        let body = batch_payload(collection, objects);
        let items: Vec<WireBatchItem> =
            self.call(Port::Bulk, "POST", BATCH_PATH, Some(&body), collection)?;
        Ok(items.into_iter().map(WireBatchItem::into_outcome).collect())
    }

    fn query(
        &mut self,
        collection: &str,
        request: &QueryRequest,
    ) -> Result<Vec<QueryHit>, EngineError> {
        let query = build_get_query(collection, request)?;
        let body = json!({ "query": query });
        let payload = match self.send(Port::Primary, "POST", GRAPHQL_PATH, Some(&body)) {
            Ok(payload) => payload,
            Err(error) => return Err(self.engine_error(error, collection)),
        };
        parse_get_response(collection, &payload)
    }

    fn list_collections(&mut self) -> Result<Vec<String>, EngineError> {
        let schema: WireSchema = self.call(Port::Primary, "GET", SCHEMA_PATH, None, "")?;
        Ok(schema.classes.into_iter().map(|class| class.class).collect())
    }

    fn describe_collection(&mut self, name: &str) -> Result<CollectionSchema, EngineError> {
        let path = class_path(name);
        let class: WireClass = self.call(Port::Primary, "GET", &path, None, name)?;
        class.into_schema()
    }
}

fn class_path(name: &str) -> String {
    format!("{SCHEMA_PATH}/{}", escape_segment(name))
}

pub(crate) fn schema_payload(schema: &CollectionSchema) -> Value {
    let properties: Vec<Value> = schema
        .properties
        .iter()
        .map(|property| {
            json!({
                "name": property.name,
                "dataType": [property.data_type.to_string()],
                "description": property.description,
            })
        })
        .collect();

    let mut payload = json!({
        "class": schema.name,
        "description": schema.description,
        "vectorizer": "none",
        "vectorIndexType": "hnsw",
        "vectorIndexConfig": { "distance": schema.distance.to_string() },
        "properties": properties,
    });
    if let Some(dimensions) = schema.dimensions {
        payload["dimensions"] = json!(dimensions);
    }
    payload
}

pub(crate) fn batch_payload(collection: &str, objects: &[EngineObject]) -> Value {
    let objects: Vec<Value> = objects
        .iter()
        .map(|object| {
            json!({
                "class": collection,
                "properties": object.properties,
                "vector": object.vector,
            })
        })
        .collect();
    json!({ "objects": objects })
}

#[derive(Debug, Deserialize)]
struct WireSchema {
    #[serde(default)]
    classes: Vec<WireClass>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireClass {
    class: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    vector_index_config: Option<WireIndexConfig>,
    #[serde(default)]
    dimensions: Option<usize>,
    #[serde(default)]
    properties: Vec<WireProperty>,
}

#[derive(Debug, Deserialize)]
struct WireIndexConfig {
    #[serde(default)]
    distance: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProperty {
    name: String,
    #[serde(default)]
    data_type: Vec<String>,
    #[serde(default)]
    description: String,
}

impl WireClass {
    pub(crate) fn into_schema(self) -> Result<CollectionSchema, EngineError> {
        let distance = match self
            .vector_index_config
            .and_then(|config| config.distance)
            .as_deref()
        {
            None | Some("cosine") => Distance::Cosine,
            Some(other) => {
                return Err(EngineError::Protocol(format!(
                    "collection '{}' uses unsupported distance '{other}'",
                    self.class
                )))
            }
        };
        let mut properties = Vec::with_capacity(self.properties.len());
        for property in self.properties {
            let data_type = match property.data_type.first().map(String::as_str) {
                Some("text") => DataType::Text,
                other => {
                    return Err(EngineError::Protocol(format!(
                        "property '{}' has unsupported data type {other:?}",
                        property.name
                    )))
                }
            };
            properties.push(Property {
                name: property.name,
                data_type,
                description: property.description,
            });
        }

        Ok(CollectionSchema {
            name: self.class,
            description: self.description,
            distance,
            dimensions: self.dimensions,
            properties,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireBatchItem {
    #[serde(default)]
    result: Option<WireBatchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct WireBatchResult {
    #[serde(default)]
    errors: Option<WireErrors>,
}

#[derive(Debug, Default, Deserialize)]
struct WireErrors {
    #[serde(default)]
    error: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message: String,
}

impl WireBatchItem {
    pub(crate) fn into_outcome(self) -> Result<(), EngineError> {
        let messages: Vec<String> = self
            .result
            .and_then(|result| result.errors)
            .map(|errors| errors.error.into_iter().map(|error| error.message).collect())
            .unwrap_or_default();
        if messages.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Rejected(messages.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests;
