use tracing::error;

use crate::collection::CollectionInfo;
use crate::engine::Engine;
use crate::errors::QueryError;
use crate::supervisor::ConnectionSupervisor;

/// Read-only view of the collections known to the engine.
pub struct CollectionDirectory<'a, E: Engine> {
    supervisor: &'a ConnectionSupervisor<E>,
}

impl<'a, E: Engine> CollectionDirectory<'a, E> {
    pub fn new(supervisor: &'a ConnectionSupervisor<E>) -> Self {
        Self { supervisor }
    }

    pub fn try_list_collections(&self) -> Result<Vec<String>, QueryError> {
        let mut session = self.supervisor.acquire()?;
        session.list_collections().map_err(|error| {
            if error.is_transport() {
                session.mark_disconnected();
            }
            QueryError::from(error)
        })
    }

    /// Empty on any failure.
    pub fn list_collections(&self) -> Vec<String> {
        self.try_list_collections().unwrap_or_else(|error| {
            error!(%error, "list collections failed; returning none");
            Vec::new()
        })
    }

    pub fn try_collection_info(&self, name: &str) -> Result<CollectionInfo, QueryError> {
        let mut session = self.supervisor.acquire()?;
        session
            .describe_collection(name)
            .map(CollectionInfo::from)
            .map_err(|error| {
                if error.is_transport() {
                    session.mark_disconnected();
                }
                QueryError::from(error)
            })
    }

    /// `None` both when the collection does not exist and when the lookup
    /// failed.
    pub fn collection_info(&self, name: &str) -> Option<CollectionInfo> {
        match self.try_collection_info(name) {
            Ok(info) => Some(info),
            Err(error) => {
                error!(collection = name, %error, "collection info unavailable");
                None
            }
        }
    }
}
