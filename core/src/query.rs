//! Similarity search: query composition and result decoding.

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::collection::{QueryFilter, SearchResult, METADATA_FIELD, TEXT_FIELD};
use crate::engine::{Engine, Filter, QueryHit, QueryRequest};
use crate::errors::QueryError;
use crate::supervisor::ConnectionSupervisor;

pub struct QueryComposer<'a, E: Engine> {
    supervisor: &'a ConnectionSupervisor<E>,
    default_limit: usize,
}

impl<'a, E: Engine> QueryComposer<'a, E> {
    pub fn new(supervisor: &'a ConnectionSupervisor<E>, default_limit: usize) -> Self {
        Self {
            supervisor,
            default_limit,
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Builds the engine request: cosine nearest neighbours returning `text`
    /// and `metadata`, optionally constrained by `filters`.
    pub fn compose(
        &self,
        vector: &[f32],
        limit: Option<usize>,
        filters: Option<&QueryFilter>,
    ) -> Result<QueryRequest, QueryError> {
        let limit = limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(QueryError::InvalidLimit);
        }
        let filter = match filters {
            Some(filters) => build_filter(filters)?,
            None => None,
        };

        Ok(QueryRequest {
            vector: vector.to_vec(),
            limit,
            return_fields: vec![TEXT_FIELD.to_string(), METADATA_FIELD.to_string()],
            filter,
        })
    }

    /// Runs a search and reports failures to the caller.
    pub fn try_search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: Option<usize>,
        filters: Option<&QueryFilter>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let request = self.compose(vector, limit, filters)?;
        let mut session = self.supervisor.acquire()?;
        let hits = session.query(collection, &request).map_err(|error| {
            if error.is_transport() {
                session.mark_disconnected();
            }
            QueryError::from(error)
        })?;
        Ok(decode_hits(hits))
    }

    /// Like [`try_search`](Self::try_search), but a failure is logged and
    /// reported as no results. Callers cannot tell an empty collection from
    /// a failed query.
    pub fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: Option<usize>,
        filters: Option<&QueryFilter>,
    ) -> Vec<SearchResult> {
        match self.try_search(collection, vector, limit, filters) {
            Ok(results) => results,
            Err(error) => {
                error!(collection, %error, "search failed; returning no results");
                Vec::new()
            }
        }
    }
}

/// One equality predicate on `metadata.<key>` per entry, ANDed together.
/// An empty map means no predicate.
pub fn build_filter(filters: &QueryFilter) -> Result<Option<Filter>, QueryError> {
    let mut operands = Vec::with_capacity(filters.len());
    for (key, value) in filters {
        if key.is_empty() {
            return Err(QueryError::InvalidFilterKey);
        }
        operands.push(Filter::Equal {
            path: vec![METADATA_FIELD.to_string(), key.clone()],
            value: value.clone(),
        });
    }

    Ok(match operands.len() {
        0 => None,
        1 => operands.pop(),
        _ => Some(Filter::And(operands)),
    })
}

/// Keeps the engine's ordering; hits without properties are skipped.
pub fn decode_hits(hits: Vec<QueryHit>) -> Vec<SearchResult> {
    let total = hits.len();
    let results: Vec<SearchResult> = hits
        .into_iter()
        .filter_map(|hit| {
            let properties = hit.properties?;
            Some(SearchResult {
                text: string_property(&properties, TEXT_FIELD),
                metadata: string_property(&properties, METADATA_FIELD),
                distance: hit.distance,
            })
        })
        .collect();
    if results.len() < total {
        debug!(skipped = total - results.len(), "hits without properties skipped");
    }
    results
}

fn string_property(properties: &Map<String, Value>, name: &str) -> String {
    match properties.get(name) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
