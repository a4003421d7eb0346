//! In-memory task list kept coherent with a [`PersistencePort`].
//!
//! The store is authoritative and the cache is a hint: storage may change
//! underneath us (another process sharing the task file, another client of
//! the task API). Every mutation therefore:
//!
//! 1. claims the task id in the pending set, dropping the call if another
//!    operation on that id is still in flight (no queueing, no retry);
//! 2. looks the task up in the cache, refreshing once and retrying the
//!    lookup once if it is missing;
//! 3. writes through the port and caches the port's returned record;
//! 4. on failure, releases the id, refreshes once, then surfaces the error.
//!
//! Writes are never retried automatically: a failed write may still have
//! been applied by the store.
//!
//! Operations on different ids may interleave freely. Locks guarding the
//! cache and the pending set are only held between awaits.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::TasksConfig;
use crate::deadline::today;
use crate::error::{Error, ErrorNotice, Result};
use crate::events::{EventBus, SyncEvent};
use crate::port::PersistencePort;
use crate::report::ReportExporter;
use crate::task::{generate_task_id, TaskInput, TaskPatch, TaskRecord};

/// Result of a guarded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    Applied(T),
    /// Another operation on the same id was in flight; nothing was done.
    InFlight,
}

impl<T> Mutation<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Mutation::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Mutation::Applied(value) => Some(value),
            Mutation::InFlight => None,
        }
    }
}

/// Ids that appeared in or vanished from storage relative to the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileReport {
    pub fn drifted(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Releases a pending claim when dropped, whatever path the operation took.
struct PendingClaim<'a> {
    pending: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

pub struct TaskSynchronizer<P> {
    port: P,
    policy: TasksConfig,
    cache: Mutex<Vec<TaskRecord>>,
    pending: Mutex<HashSet<String>>,
    last_error: Mutex<Option<ErrorNotice>>,
    events: EventBus,
}

impl<P: PersistencePort> TaskSynchronizer<P> {
    /// Starts with an empty cache; call [`refresh`](Self::refresh) to load.
    pub fn new(port: P, policy: TasksConfig) -> Self {
        Self {
            port,
            policy,
            cache: Mutex::new(Vec::new()),
            pending: Mutex::new(HashSet::new()),
            last_error: Mutex::new(None),
            events: EventBus::new(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn policy(&self) -> &TasksConfig {
        &self.policy
    }

    // =========================================================================
    // Read accessors
    // =========================================================================

    /// Current cache contents, in storage order.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.cache.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<TaskRecord> {
        self.cache.lock().iter().find(|task| task.id == id).cloned()
    }

    /// Consistent copy for report generation, without records lacking an
    /// id or title.
    pub fn snapshot(&self) -> Vec<TaskRecord> {
        self.cache
            .lock()
            .iter()
            .filter(|task| task.is_exportable())
            .cloned()
            .collect()
    }

    pub fn export<E: ReportExporter>(&self, exporter: &E, today: NaiveDate) -> Result<E::Output> {
        exporter.export(&self.snapshot(), today)
    }

    pub fn last_error(&self) -> Option<ErrorNotice> {
        self.last_error.lock().clone()
    }

    pub fn dismiss_error(&self) {
        *self.last_error.lock() = None;
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.lock().contains(id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Replace the cache with a full read from storage.
    pub async fn refresh(&self) -> Result<()> {
        match self.reload().await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Validate, stamp, and store a new task.
    ///
    /// Validation failures never reach storage. A store failure leaves the
    /// cache untouched.
    pub async fn create(&self, input: TaskInput) -> Result<TaskRecord> {
        let input = input
            .validate(&self.policy, today())
            .map_err(|err| self.surface(err))?;
        let record = TaskRecord::from_input(input, generate_task_id(), Utc::now());

        let stored = self
            .port
            .create(record)
            .await
            .map_err(|err| self.surface(err))?;
        self.cache_upsert(stored.clone());
        tracing::debug!(id = %stored.id, "task created");
        self.events.publish(SyncEvent::Created {
            id: stored.id.clone(),
        });

        // Pick up anything written elsewhere since the last read. The task
        // is stored, so a failure here is not the caller's error.
        if let Err(err) = self.absorb_drift().await {
            tracing::warn!(error = %err, "reconcile after create failed");
        }
        Ok(stored)
    }

    /// Flip `completed` on one task.
    pub async fn toggle_completion(&self, id: &str) -> Result<Mutation<TaskRecord>> {
        let Some(claim) = self.claim(id) else {
            return Ok(Mutation::InFlight);
        };
        let result = self.toggle_claimed(id).await;
        drop(claim);
        self.settle(result).await.map(Mutation::Applied)
    }

    /// Apply a field update to one task.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Mutation<TaskRecord>> {
        let Some(claim) = self.claim(id) else {
            return Ok(Mutation::InFlight);
        };
        let result = self.update_claimed(id, &patch).await;
        drop(claim);
        self.settle(result).await.map(Mutation::Applied)
    }

    /// Delete one task, returning the record that was removed.
    pub async fn remove(&self, id: &str) -> Result<Mutation<TaskRecord>> {
        let Some(claim) = self.claim(id) else {
            return Ok(Mutation::InFlight);
        };
        let result = self.remove_claimed(id).await;
        drop(claim);
        self.settle(result).await.map(Mutation::Applied)
    }

    /// Compare cached ids with a fresh read; adopt the fresh set if they
    /// differ.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.absorb_drift().await.map_err(|err| self.surface(err))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn absorb_drift(&self) -> Result<ReconcileReport> {
        let fresh = self.port.find_all().await?;

        let report = {
            let mut cache = self.cache.lock();
            let report = diff_ids(&cache, &fresh);
            if report.drifted() {
                *cache = fresh;
            }
            report
        };

        if report.drifted() {
            tracing::info!(
                added = report.added.len(),
                removed = report.removed.len(),
                "cache drifted from storage; adopted stored set"
            );
            self.events.publish(SyncEvent::Reconciled {
                added: report.added.clone(),
                removed: report.removed.clone(),
            });
        }
        Ok(report)
    }

    fn claim(&self, id: &str) -> Option<PendingClaim<'_>> {
        if !self.pending.lock().insert(id.to_string()) {
            tracing::debug!(id, "operation already in flight; dropping call");
            return None;
        }
        Some(PendingClaim {
            pending: &self.pending,
            id: id.to_string(),
        })
    }

    async fn toggle_claimed(&self, id: &str) -> Result<TaskRecord> {
        let current = self.locate(id).await?;
        let stored = self.port.update(current.toggled(Utc::now())).await?;
        self.cache_upsert(stored.clone());
        tracing::debug!(id, completed = stored.completed, "task toggled");
        self.events.publish(SyncEvent::Updated { id: id.to_string() });
        Ok(stored)
    }

    async fn update_claimed(&self, id: &str, patch: &TaskPatch) -> Result<TaskRecord> {
        let current = self.locate(id).await?;
        let next = patch.apply(&current, &self.policy, Utc::now())?;
        let stored = self.port.update(next).await?;
        self.cache_upsert(stored.clone());
        tracing::debug!(id, "task updated");
        self.events.publish(SyncEvent::Updated { id: id.to_string() });
        Ok(stored)
    }

    async fn remove_claimed(&self, id: &str) -> Result<TaskRecord> {
        let current = self.locate(id).await?;
        self.port.delete(id).await?;
        self.cache.lock().retain(|task| task.id != id);
        tracing::debug!(id, "task removed");
        self.events.publish(SyncEvent::Removed { id: id.to_string() });
        Ok(current)
    }

    /// Cached record, or one refresh and a single retry of the lookup.
    async fn locate(&self, id: &str) -> Result<TaskRecord> {
        if let Some(task) = self.get(id) {
            return Ok(task);
        }
        tracing::debug!(id, "task not cached; refreshing before retry");
        self.reload().await?;
        self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Recovery path shared by all guarded mutations.
    async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        // A miss on an id the cache no longer holds comes from `locate`,
        // which has just reloaded.
        let stale = match &err {
            Error::NotFound(id) => self.get(id).is_some(),
            err => !err.is_local(),
        };
        if stale {
            tracing::warn!(error = %err, "mutation failed; refreshing cache");
            if let Err(refresh_err) = self.reload().await {
                tracing::warn!(error = %refresh_err, "recovery refresh failed");
            }
        }
        Err(self.surface(err))
    }

    async fn reload(&self) -> Result<()> {
        let records = self.port.find_all().await?;
        let count = records.len();
        *self.cache.lock() = records;
        tracing::debug!(count, "cache refreshed");
        self.events.publish(SyncEvent::Refreshed { count });
        Ok(())
    }

    fn cache_upsert(&self, record: TaskRecord) {
        let mut cache = self.cache.lock();
        match cache.iter_mut().find(|task| task.id == record.id) {
            Some(slot) => *slot = record,
            None => cache.push(record),
        }
    }

    /// Remember the error for the presentation layer and hand it back.
    fn surface(&self, err: Error) -> Error {
        *self.last_error.lock() = Some(ErrorNotice::from(&err));
        err
    }
}

fn diff_ids(cached: &[TaskRecord], stored: &[TaskRecord]) -> ReconcileReport {
    let cached: HashSet<&str> = cached.iter().map(|task| task.id.as_str()).collect();
    let stored: HashSet<&str> = stored.iter().map(|task| task.id.as_str()).collect();
    let mut added: Vec<String> = stored.difference(&cached).map(|id| id.to_string()).collect();
    let mut removed: Vec<String> = cached.difference(&stored).map(|id| id.to_string()).collect();
    added.sort();
    removed.sort();
    ReconcileReport { added, removed }
}

/// Reconcile every `every` while no operation is pending.
///
/// Failures are recorded as the synchronizer's last error; the loop keeps
/// running until the handle is aborted.
pub fn spawn_reconciler<P>(sync: Arc<TaskSynchronizer<P>>, every: Duration) -> JoinHandle<()>
where
    P: PersistencePort + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if sync.has_pending() {
                tracing::debug!("operations pending; skipping reconcile");
                continue;
            }
            if let Err(err) = sync.reconcile().await {
                tracing::debug!(error = %err, "periodic reconcile failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;

    fn sync_with(records: Vec<TaskRecord>) -> TaskSynchronizer<MemoryPort> {
        TaskSynchronizer::new(MemoryPort::with_records(records), TasksConfig::default())
    }

    fn record(id: &str) -> TaskRecord {
        TaskRecord::from_input(TaskInput::new(format!("task {id}")), id.to_string(), Utc::now())
    }

    #[tokio::test]
    async fn claim_is_released_on_drop() {
        let sync = sync_with(Vec::new());
        let claim = sync.claim("a").expect("first claim");
        assert!(sync.is_pending("a"));
        assert!(sync.claim("a").is_none());
        assert!(sync.claim("b").is_some());
        drop(claim);
        assert!(!sync.is_pending("a"));
        assert!(!sync.has_pending());
    }

    #[tokio::test]
    async fn refresh_replaces_cache() {
        let sync = sync_with(vec![record("a"), record("b")]);
        assert!(sync.tasks().is_empty());
        sync.refresh().await.unwrap();
        assert_eq!(sync.tasks().len(), 2);
    }

    #[tokio::test]
    async fn snapshot_skips_untitled_records() {
        let mut untitled = record("b");
        untitled.title = String::new();
        let sync = sync_with(vec![record("a"), untitled]);
        sync.refresh().await.unwrap();
        let snapshot = sync.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "a");
    }

    #[tokio::test]
    async fn validation_errors_are_remembered() {
        let sync = sync_with(Vec::new());
        let err = sync.create(TaskInput::new("  ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "title", .. }));
        assert_eq!(sync.last_error().unwrap().kind, "validation");
        assert!(sync.port().is_empty());

        sync.dismiss_error();
        assert!(sync.last_error().is_none());
    }

    #[tokio::test]
    async fn missing_id_is_not_found_after_one_refresh() {
        let sync = sync_with(vec![record("a")]);
        let err = sync.toggle_completion("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "nope"));
        assert!(!sync.is_pending("nope"));
        // The retry's refresh loaded the stored set.
        assert_eq!(sync.tasks().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_without_drift_keeps_cache() {
        let sync = sync_with(vec![record("a")]);
        sync.refresh().await.unwrap();
        let report = sync.reconcile().await.unwrap();
        assert!(!report.drifted());
    }

    #[tokio::test]
    async fn update_applies_patch() {
        let sync = sync_with(vec![record("a")]);
        sync.refresh().await.unwrap();
        let patch = TaskPatch {
            title: Some("renamed".to_string()),
            ..TaskPatch::default()
        };
        let updated = sync.update("a", patch).await.unwrap().applied().unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(sync.get("a").unwrap().title, "renamed");
        assert_eq!(
            sync.port().find_by_id("a").await.unwrap().unwrap().title,
            "renamed"
        );
    }
}
