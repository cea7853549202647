//! Facade tying the store components to one supervised engine session.

use crate::collection::{CollectionInfo, Document, QueryFilter, SearchResult};
use crate::config::StoreConfig;
use crate::directory::CollectionDirectory;
use crate::engine::Engine;
use crate::errors::{IngestionError, QueryError, SchemaError};
use crate::ingest::{BatchWriter, IngestReport, IngestionBatcher};
use crate::query::QueryComposer;
use crate::schema::SchemaManager;
use crate::supervisor::{ConnectionState, ConnectionSupervisor};

pub struct VectorStore<E: Engine> {
    supervisor: ConnectionSupervisor<E>,
    config: StoreConfig,
}

impl<E: Engine> VectorStore<E> {
    /// The engine session is opened lazily; call [`shutdown`](Self::shutdown)
    /// when done, or use [`scoped`](Self::scoped).
    pub fn open(engine: E, config: StoreConfig) -> Self {
        Self {
            supervisor: ConnectionSupervisor::open(engine),
            config,
        }
    }

    /// Runs `f` against a fresh store and shuts it down afterwards, including
    /// when `f` returns an error or panics.
    pub fn scoped<T>(engine: E, config: StoreConfig, f: impl FnOnce(&Self) -> T) -> T {
        let store = Self::open(engine, config);
        let guard = ShutdownGuard(&store);
        f(guard.0)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<E> {
        &self.supervisor
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn schema(&self) -> SchemaManager<'_, E> {
        SchemaManager::new(&self.supervisor, self.config.dimensions)
    }

    pub fn ingestion(&self) -> IngestionBatcher<'_, E> {
        IngestionBatcher::new(&self.supervisor, self.config.batch, self.config.mismatch)
            .with_fallback_dimensions(self.config.dimensions)
    }

    pub fn queries(&self) -> QueryComposer<'_, E> {
        QueryComposer::new(&self.supervisor, self.config.default_limit)
    }

    pub fn directory(&self) -> CollectionDirectory<'_, E> {
        CollectionDirectory::new(&self.supervisor)
    }

    pub fn create_collection(&self, name: &str, description: &str) -> Result<bool, SchemaError> {
        self.schema().create_collection(name, description)
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.schema().delete_collection(name)
    }

    pub fn add_documents(
        &self,
        collection: &str,
        documents: &[Document],
        vectors: Vec<Vec<f32>>,
    ) -> Result<IngestReport, IngestionError> {
        self.ingestion().add_documents(collection, documents, vectors)
    }

    pub fn batch(&self, collection: &str) -> Result<BatchWriter<'_, E>, IngestionError> {
        self.ingestion().writer(collection)
    }

    pub fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: Option<usize>,
        filters: Option<&QueryFilter>,
    ) -> Vec<SearchResult> {
        self.queries().search(collection, vector, limit, filters)
    }

    pub fn try_search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: Option<usize>,
        filters: Option<&QueryFilter>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        self.queries().try_search(collection, vector, limit, filters)
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.directory().list_collections()
    }

    pub fn try_list_collections(&self) -> Result<Vec<String>, QueryError> {
        self.directory().try_list_collections()
    }

    pub fn collection_info(&self, name: &str) -> Option<CollectionInfo> {
        self.directory().collection_info(name)
    }

    pub fn try_collection_info(&self, name: &str) -> Result<CollectionInfo, QueryError> {
        self.directory().try_collection_info(name)
    }

    /// Idempotent; returns whether this call closed the session.
    pub fn shutdown(&self) -> bool {
        self.supervisor.shutdown()
    }
}

struct ShutdownGuard<'a, E: Engine>(&'a VectorStore<E>);

impl<E: Engine> Drop for ShutdownGuard<'_, E> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

#[cfg(test)]
mod tests;
