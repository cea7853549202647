//! In-process engine with the same contract as a remote one.
//!
//! Ranking is exact cosine over every stored object, so results are
//! deterministic. A [`MemoryEngineHandle`] shares the state and can inject
//! transport faults, which is how supervisor and ingestion failure paths are
//! exercised without a network.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::{BatchOutcome, Endpoint, Engine, EngineError, EngineObject, Filter, QueryHit, QueryRequest};
use crate::collection::CollectionSchema;
use crate::vector::{first_non_finite, CosineQuery};

type ObjectId = u64;

#[derive(Debug, Clone)]
struct StoredObject {
    vector: Vec<f32>,
    properties: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct MemoryCollection {
    schema: CollectionSchema,
    objects: BTreeMap<ObjectId, StoredObject>,
    next_id: ObjectId,
}

impl MemoryCollection {
    fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn insert(&mut self, object: &EngineObject) -> Result<ObjectId, EngineError> {
        self.validate_vector(&object.vector)?;
        if let Some(unknown) = object
            .properties
            .keys()
            .find(|name| !self.schema.has_property(name))
        {
            return Err(EngineError::Rejected(format!(
                "property '{unknown}' is not declared by collection '{}'",
                self.schema.name
            )));
        }

        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        self.objects.insert(
            id,
            StoredObject {
                vector: object.vector.clone(),
                properties: object.properties.clone(),
            },
        );
        Ok(id)
    }

    fn validate_vector(&self, values: &[f32]) -> Result<(), EngineError> {
        if let Some(expected) = self.schema.dimensions {
            if values.len() != expected {
                return Err(EngineError::Rejected(format!(
                    "invalid vector dimension: expected {expected}, got {}",
                    values.len()
                )));
            }
        }
        if let Some((index, _)) = first_non_finite(values) {
            return Err(EngineError::Rejected(format!(
                "vector contains non-finite value at index {index}"
            )));
        }
        Ok(())
    }

    fn query(&self, request: &QueryRequest) -> Result<Vec<QueryHit>, EngineError> {
        self.validate_vector(&request.vector)?;
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let prepared = CosineQuery::new(&request.vector);
        let mut scored: Vec<(f32, &StoredObject)> = self
            .objects
            .values()
            .filter(|object| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |filter| matches_filter(&object.properties, filter))
            })
            .map(|object| (prepared.distance(&object.vector), object))
            .collect();

        // Stable sort keeps insertion order for equal distances.
        scored.sort_by(|left, right| {
            left.0
                .partial_cmp(&right.0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(scored
            .into_iter()
            .take(request.limit)
            .map(|(distance, object)| QueryHit {
                properties: Some(project(&object.properties, &request.return_fields)),
                distance: Some(distance),
            })
            .collect())
    }
}

fn project(properties: &Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|field| {
            properties
                .get(field)
                .map(|value| (field.clone(), value.clone()))
        })
        .collect()
}

pub(crate) fn matches_filter(properties: &Map<String, Value>, filter: &Filter) -> bool {
    match filter {
        Filter::And(operands) => operands
            .iter()
            .all(|operand| matches_filter(properties, operand)),
        Filter::Equal { path, value } => {
            resolve_path(properties, path).is_some_and(|actual| value.matches_json(&actual))
        }
    }
}

/// Walks `[property, key...]`. A string property on the way is decoded as a
/// JSON blob before descending, which is how `metadata.<key>` reaches inside
/// the stored metadata text.
fn resolve_path(properties: &Map<String, Value>, path: &[String]) -> Option<Value> {
    let (head, rest) = path.split_first()?;
    let mut current = properties.get(head)?.clone();
    for segment in rest {
        if let Value::String(blob) = &current {
            current = serde_json::from_str(blob).ok()?;
        }
        current = current.get(segment.as_str())?.clone();
    }
    Some(current)
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    connects: usize,
    closes: usize,
    failing_connects: usize,
    failing_operations: usize,
    batch_sizes: Vec<usize>,
    collections: BTreeMap<String, MemoryCollection>,
}

impl MemoryState {
    fn check_session(&mut self) -> Result<(), EngineError> {
        if !self.connected {
            return Err(EngineError::Transport("not connected".to_string()));
        }
        if self.failing_operations > 0 {
            self.failing_operations -= 1;
            self.connected = false;
            return Err(EngineError::Transport("connection reset by peer".to_string()));
        }
        Ok(())
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut MemoryCollection, EngineError> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }
}

fn lock(shared: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct MemoryEngine {
    endpoint: Endpoint,
    shared: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("memory", 0, 0),
            shared: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Returns a control handle sharing this engine's state.
    pub fn handle(&self) -> MemoryEngineHandle {
        MemoryEngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Engine for MemoryEngine {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn connect(&mut self) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(EngineError::Transport("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }

    fn close(&mut self) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        state.closes += 1;
        state.connected = false;
        Ok(())
    }

    fn create_collection(&mut self, schema: &CollectionSchema) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        state.check_session()?;
        if state.collections.contains_key(&schema.name) {
            return Err(EngineError::AlreadyExists(schema.name.clone()));
        }
        if schema.dimensions == Some(0) {
            return Err(EngineError::Rejected("dimensions must be > 0".to_string()));
        }
        state
            .collections
            .insert(schema.name.clone(), MemoryCollection::new(schema.clone()));
        Ok(())
    }

    fn delete_collection(&mut self, name: &str) -> Result<(), EngineError> {
        let mut state = lock(&self.shared);
        state.check_session()?;
        state
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    fn insert_batch(
        &mut self,
        collection: &str,
        objects: &[EngineObject],
    ) -> Result<BatchOutcome, EngineError> {
        let mut state = lock(&self.shared);
        state.check_session()?;
        state.batch_sizes.push(objects.len());
        let target = state.collection_mut(collection)?;
        Ok(objects
            .iter()
            .map(|object| target.insert(object).map(|_| ()))
            .collect())
    }

    fn query(
        &mut self,
        collection: &str,
        request: &QueryRequest,
    ) -> Result<Vec<QueryHit>, EngineError> {
        let mut state = lock(&self.shared);
        state.check_session()?;
        state.collection_mut(collection)?.query(request)
    }

    fn list_collections(&mut self) -> Result<Vec<String>, EngineError> {
        let mut state = lock(&self.shared);
        state.check_session()?;
        Ok(state.collections.keys().cloned().collect())
    }

    fn describe_collection(&mut self, name: &str) -> Result<CollectionSchema, EngineError> {
        let mut state = lock(&self.shared);
        state.check_session()?;
        state
            .collection_mut(name)
            .map(|collection| collection.schema.clone())
    }
}

/// Shared view of a [`MemoryEngine`] for inspection and fault injection.
#[derive(Debug, Clone)]
pub struct MemoryEngineHandle {
    shared: Arc<Mutex<MemoryState>>,
}

impl MemoryEngineHandle {
    /// Simulates the peer dropping the session.
    pub fn drop_connection(&self) {
        lock(&self.shared).connected = false;
    }

    pub fn fail_next_connects(&self, count: usize) {
        lock(&self.shared).failing_connects = count;
    }

    /// The next `count` operations fail with a transport error and drop the
    /// session.
    pub fn fail_next_operations(&self, count: usize) {
        lock(&self.shared).failing_operations = count;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.shared).connects
    }

    pub fn close_count(&self) -> usize {
        lock(&self.shared).closes
    }

    /// Sizes of every bulk insert request received, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        lock(&self.shared).batch_sizes.clone()
    }

    pub fn object_count(&self, collection: &str) -> Option<usize> {
        lock(&self.shared)
            .collections
            .get(collection)
            .map(|collection| collection.objects.len())
    }
}
