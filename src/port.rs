//! The storage contract the synchronizer depends on.
//!
//! Any backing medium (in-process map, JSON file, HTTP API) implements
//! [`PersistencePort`]. Every operation is atomic from the caller's point of
//! view: a read observes the state before or after a write, never a partial
//! one. Implementations serialize their own read-modify-write cycles.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::task::TaskRecord;

pub trait PersistencePort: Send + Sync {
    /// Every stored record. Fails with `StorageUnavailable` or
    /// `StorageCorrupt` when the medium cannot be read or parsed.
    fn find_all(&self) -> impl Future<Output = Result<Vec<TaskRecord>>> + Send;

    /// The matching record, or `None`. A missing id is not an error.
    fn find_by_id(&self, id: &str) -> impl Future<Output = Result<Option<TaskRecord>>> + Send;

    /// Store a new record and return it unchanged. `DuplicateId` if the id
    /// is already taken.
    fn create(&self, record: TaskRecord) -> impl Future<Output = Result<TaskRecord>> + Send;

    /// Replace the record with the same id. `NotFound` if there is none.
    fn update(&self, record: TaskRecord) -> impl Future<Output = Result<TaskRecord>> + Send;

    /// Remove the record. `NotFound` if there is none.
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// In-process store. Cloning shares the same underlying records, so two
/// clones behave like two views over one storage medium.
#[derive(Debug, Clone, Default)]
pub struct MemoryPort {
    records: Arc<Mutex<Vec<TaskRecord>>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<TaskRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Replace the stored set wholesale, bypassing the port contract.
    pub fn replace_all(&self, records: Vec<TaskRecord>) {
        *self.records.lock() = records;
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PersistencePort for MemoryPort {
    async fn find_all(&self) -> Result<Vec<TaskRecord>> {
        Ok(self.records.lock().clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        Ok(self.records.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        let mut records = self.records.lock();
        if records.iter().any(|r| r.id == record.id) {
            return Err(Error::DuplicateId(record.id));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, record: TaskRecord) -> Result<TaskRecord> {
        let mut records = self.records.lock();
        let slot = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::NotFound(record.id.clone()))?;
        *slot = record.clone();
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}
