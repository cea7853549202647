//! Batched document ingestion with per-document outcomes.

use std::time::Instant;

use tracing::{debug, warn};

use crate::collection::{Document, DEFAULT_DIMENSIONS};
use crate::config::{BatchPolicy, MismatchPolicy};
use crate::engine::{Engine, EngineObject};
use crate::errors::IngestionError;
use crate::supervisor::ConnectionSupervisor;
use crate::vector::first_non_finite;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    /// Position of the document in submission order.
    pub index: usize,
    pub result: Result<(), IngestionError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// One entry per document, ordered by index.
    pub outcomes: Vec<DocumentOutcome>,
    /// Number of bulk requests attempted.
    pub batches: usize,
}

impl IngestReport {
    pub fn inserted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }
}

pub struct IngestionBatcher<'a, E: Engine> {
    supervisor: &'a ConnectionSupervisor<E>,
    policy: BatchPolicy,
    mismatch: MismatchPolicy,
    fallback_dimensions: usize,
}

impl<'a, E: Engine> IngestionBatcher<'a, E> {
    pub fn new(
        supervisor: &'a ConnectionSupervisor<E>,
        policy: BatchPolicy,
        mismatch: MismatchPolicy,
    ) -> Self {
        Self {
            supervisor,
            policy,
            mismatch,
            fallback_dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Vector length assumed for collections whose description omits it.
    pub fn with_fallback_dimensions(mut self, dimensions: usize) -> Self {
        self.fallback_dimensions = dimensions;
        self
    }

    /// Opens a writer on an existing collection, learning its dimensionality
    /// from the engine when it reports one.
    pub fn writer(&self, collection: &str) -> Result<BatchWriter<'a, E>, IngestionError> {
        let mut session = self.supervisor.acquire()?;
        let dimensions = match session.describe_collection(collection) {
            Ok(schema) => schema.dimensions.unwrap_or_else(|| {
                debug!(
                    collection,
                    dimensions = self.fallback_dimensions,
                    "engine did not report dimensions; using configured value"
                );
                self.fallback_dimensions
            }),
            Err(source) if source.is_transport() => {
                session.mark_disconnected();
                return Err(IngestionError::ConnectionLost(source.to_string()));
            }
            Err(source) => {
                return Err(IngestionError::UnknownCollection {
                    name: collection.to_string(),
                    source,
                })
            }
        };

        Ok(BatchWriter {
            supervisor: self.supervisor,
            collection: collection.to_string(),
            dimensions,
            policy: self.policy,
            buffer: Vec::new(),
            buffered_since: None,
            next_index: 0,
            outcomes: Vec::new(),
            batches: 0,
            lost: None,
        })
    }

    /// Pairs `documents[i]` with `vectors[i]` and ingests them in batches.
    pub fn add_documents(
        &self,
        collection: &str,
        documents: &[Document],
        vectors: Vec<Vec<f32>>,
    ) -> Result<IngestReport, IngestionError> {
        if documents.len() != vectors.len() {
            match self.mismatch {
                MismatchPolicy::Reject => {
                    return Err(IngestionError::LengthMismatch {
                        documents: documents.len(),
                        vectors: vectors.len(),
                    })
                }
                MismatchPolicy::TruncateToShorter => warn!(
                    collection,
                    documents = documents.len(),
                    vectors = vectors.len(),
                    "document/vector count mismatch; truncating to the shorter list"
                ),
            }
        }
        if documents.is_empty() || vectors.is_empty() {
            return Ok(IngestReport::default());
        }

        let mut writer = self.writer(collection)?;
        for (document, vector) in documents.iter().zip(vectors) {
            writer.add(document, vector);
        }
        Ok(writer.finish())
    }
}

/// Buffers documents and submits them according to a [`BatchPolicy`].
///
/// There is no background timer: the delay bound is checked on every
/// [`add`](Self::add) and [`flush_if_due`](Self::flush_if_due). Dropping an
/// unfinished writer still submits what is buffered, but the outcomes are
/// only observable through [`finish`](Self::finish).
pub struct BatchWriter<'a, E: Engine> {
    supervisor: &'a ConnectionSupervisor<E>,
    collection: String,
    dimensions: usize,
    policy: BatchPolicy,
    buffer: Vec<(usize, EngineObject)>,
    buffered_since: Option<Instant>,
    next_index: usize,
    outcomes: Vec<DocumentOutcome>,
    batches: usize,
    lost: Option<String>,
}

impl<E: Engine> BatchWriter<'_, E> {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Queues one document and returns its index. Documents that fail local
    /// validation are recorded immediately and never reach the engine.
    pub fn add(&mut self, document: &Document, vector: Vec<f32>) -> usize {
        let index = self.next_index;
        self.next_index += 1;

        if self.lost.is_some() {
            self.record(index, Err(IngestionError::NotSubmitted));
            return index;
        }
        if let Err(error) = self.validate(&vector) {
            self.record(index, Err(error));
            return index;
        }
        let properties = match document.to_properties() {
            Ok(properties) => properties,
            Err(error) => {
                self.record(index, Err(IngestionError::Serialization(error.to_string())));
                return index;
            }
        };

        if self.buffer.is_empty() {
            self.buffered_since = Some(Instant::now());
        }
        self.buffer.push((index, EngineObject { properties, vector }));

        if self.buffer.len() >= self.policy.max_batch_size || self.delay_elapsed() {
            self.flush();
        }
        index
    }

    /// Flushes when the buffering delay has elapsed. Returns whether a batch
    /// was submitted.
    pub fn flush_if_due(&mut self) -> bool {
        if self.buffer.is_empty() || !self.delay_elapsed() {
            return false;
        }
        self.flush();
        true
    }

    /// Submits everything buffered as one request.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let (indices, objects): (Vec<usize>, Vec<EngineObject>) =
            std::mem::take(&mut self.buffer).into_iter().unzip();
        self.buffered_since = None;
        self.batches += 1;

        let supervisor = self.supervisor;
        let mut session = match supervisor.acquire() {
            Ok(session) => session,
            Err(error) => {
                warn!(collection = %self.collection, %error, "batch not submitted");
                self.lost = Some(error.to_string());
                for index in indices {
                    self.record(index, Err(IngestionError::Connection(error.clone())));
                }
                return;
            }
        };

        match session.insert_batch(&self.collection, &objects) {
            Ok(results) if results.len() == objects.len() => {
                let failed = results.iter().filter(|result| result.is_err()).count();
                debug!(
                    collection = %self.collection,
                    batch_size = objects.len(),
                    failed,
                    "batch flushed"
                );
                for (index, result) in indices.into_iter().zip(results) {
                    let result = result.map_err(|error| IngestionError::Rejected(error.to_string()));
                    self.record(index, result);
                }
            }
            Ok(results) => {
                let message = format!(
                    "engine returned {} outcomes for {} objects",
                    results.len(),
                    objects.len()
                );
                warn!(collection = %self.collection, %message, "batch outcome misaligned");
                for index in indices {
                    self.record(index, Err(IngestionError::Rejected(message.clone())));
                }
            }
            Err(error) if error.is_transport() => {
                session.mark_disconnected();
                warn!(collection = %self.collection, %error, "connection lost during batch");
                let message = error.to_string();
                self.lost = Some(message.clone());
                for index in indices {
                    self.record(index, Err(IngestionError::ConnectionLost(message.clone())));
                }
            }
            Err(error) => {
                warn!(collection = %self.collection, %error, "batch rejected");
                for index in indices {
                    self.record(index, Err(IngestionError::Rejected(error.to_string())));
                }
            }
        }
    }

    /// Flushes the remainder and returns every outcome, ordered by index.
    pub fn finish(mut self) -> IngestReport {
        self.flush();
        let mut outcomes = std::mem::take(&mut self.outcomes);
        outcomes.sort_by_key(|outcome| outcome.index);
        IngestReport {
            outcomes,
            batches: self.batches,
        }
    }

    fn validate(&self, vector: &[f32]) -> Result<(), IngestionError> {
        if vector.len() != self.dimensions {
            return Err(IngestionError::InvalidDimension {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        if let Some((index, _)) = first_non_finite(vector) {
            return Err(IngestionError::NonFiniteValue { index });
        }
        Ok(())
    }

    fn delay_elapsed(&self) -> bool {
        self.buffered_since
            .is_some_and(|since| since.elapsed() >= self.policy.max_delay)
    }

    fn record(&mut self, index: usize, result: Result<(), IngestionError>) {
        self.outcomes.push(DocumentOutcome { index, result });
    }
}

impl<E: Engine> Drop for BatchWriter<'_, E> {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        warn!(
            collection = %self.collection,
            buffered = self.buffer.len(),
            "batch writer dropped without finish; flushing"
        );
        self.flush();
    }
}
