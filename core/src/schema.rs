use tracing::{info, warn};

use crate::collection::CollectionSchema;
use crate::engine::{Engine, EngineError};
use crate::errors::SchemaError;
use crate::supervisor::ConnectionSupervisor;

/// Creates and deletes document collections with the fixed text/metadata
/// layout and cosine distance.
pub struct SchemaManager<'a, E: Engine> {
    supervisor: &'a ConnectionSupervisor<E>,
    dimensions: usize,
}

impl<'a, E: Engine> SchemaManager<'a, E> {
    pub fn new(supervisor: &'a ConnectionSupervisor<E>, dimensions: usize) -> Self {
        Self {
            supervisor,
            dimensions,
        }
    }

    /// Returns `Ok(true)` when created and `Ok(false)` when a collection with
    /// this name already exists.
    pub fn create_collection(&self, name: &str, description: &str) -> Result<bool, SchemaError> {
        let schema = CollectionSchema::documents(name, description, self.dimensions)?;
        let mut session = self.supervisor.acquire()?;
        match session.create_collection(&schema) {
            Ok(()) => {
                info!(collection = name, dimensions = self.dimensions, "collection created");
                Ok(true)
            }
            Err(EngineError::AlreadyExists(_)) => Ok(false),
            Err(source) => {
                if source.is_transport() {
                    session.mark_disconnected();
                }
                Err(SchemaError::Engine {
                    collection: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Best-effort delete. `false` covers both "did not exist" and any other
    /// failure; the two are not distinguished.
    pub fn delete_collection(&self, name: &str) -> bool {
        let mut session = match self.supervisor.acquire() {
            Ok(session) => session,
            Err(error) => {
                warn!(collection = name, %error, "delete collection skipped");
                return false;
            }
        };
        match session.delete_collection(name) {
            Ok(()) => {
                info!(collection = name, "collection deleted");
                true
            }
            Err(error) => {
                if error.is_transport() {
                    session.mark_disconnected();
                }
                warn!(collection = name, %error, "delete collection failed");
                false
            }
        }
    }
}
