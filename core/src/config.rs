use std::time::Duration;

use crate::collection::DEFAULT_DIMENSIONS;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_BATCH_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// When a buffered batch is submitted: at `max_batch_size` documents, or once
/// `max_delay` has passed since the first document was buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub max_batch_size: usize,
    pub max_delay: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_delay: DEFAULT_MAX_BATCH_DELAY,
        }
    }
}

/// What `add_documents` does when it gets a different number of documents
/// and vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Fail the call before anything is submitted.
    #[default]
    Reject,
    /// Pair documents and vectors up to the shorter list and drop the rest.
    TruncateToShorter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Dimensionality declared for collections created by this store.
    pub dimensions: usize,
    pub batch: BatchPolicy,
    pub mismatch: MismatchPolicy,
    pub default_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            batch: BatchPolicy::default(),
            mismatch: MismatchPolicy::default(),
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_batch_policy(mut self, max_batch_size: usize, max_delay: Duration) -> Self {
        self.batch = BatchPolicy {
            max_batch_size: max_batch_size.max(1),
            max_delay,
        };
        self
    }

    pub fn with_mismatch_policy(mut self, mismatch: MismatchPolicy) -> Self {
        self.mismatch = mismatch;
        self
    }
}
