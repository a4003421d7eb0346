//! Config-selected store.

use std::time::Duration;

use crate::config::{BackendKind, StoreConfig};
use crate::error::{Error, Result};
use crate::integrations::remote::RemoteStore;
use crate::port::PersistencePort;
use crate::storage::FileStore;
use crate::task::TaskRecord;

/// Whichever store the configuration wires in; delegates every port call.
#[derive(Debug, Clone)]
pub enum Backend {
    File(FileStore),
    Remote(RemoteStore),
}

impl Backend {
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        match config.backend {
            BackendKind::File => {
                let store = FileStore::new(config.resolved_path()?)
                    .with_lock_timeout(config.lock_timeout_ms)
                    .with_self_heal(config.self_heal);
                Ok(Backend::File(store))
            }
            BackendKind::Remote => {
                let url = config.url.as_deref().ok_or_else(|| {
                    Error::InvalidConfig("store.url is required for the remote backend".to_string())
                })?;
                let timeout = Duration::from_secs(config.request_timeout_secs);
                Ok(Backend::Remote(RemoteStore::new(url, timeout)?))
            }
        }
    }

    /// Human-readable location of the backing store.
    pub fn describe(&self) -> String {
        match self {
            Backend::File(store) => store.path().display().to_string(),
            Backend::Remote(store) => store.tasks_url().to_string(),
        }
    }
}

impl PersistencePort for Backend {
    async fn find_all(&self) -> Result<Vec<TaskRecord>> {
        match self {
            Backend::File(store) => store.find_all().await,
            Backend::Remote(store) => store.find_all().await,
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        match self {
            Backend::File(store) => store.find_by_id(id).await,
            Backend::Remote(store) => store.find_by_id(id).await,
        }
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        match self {
            Backend::File(store) => store.create(record).await,
            Backend::Remote(store) => store.create(record).await,
        }
    }

    async fn update(&self, record: TaskRecord) -> Result<TaskRecord> {
        match self {
            Backend::File(store) => store.update(record).await,
            Backend::Remote(store) => store.update(record).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self {
            Backend::File(store) => store.delete(id).await,
            Backend::Remote(store) => store.delete(id).await,
        }
    }
}
