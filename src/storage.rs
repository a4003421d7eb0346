//! JSON file store
//!
//! Persists the task list to a single JSON file:
//!
//! ```text
//! tasks.json          # {"schema_version": "taskdeck.tasks.v1", "saved_at": ..., "tasks": [...]}
//! tasks.json.lock     # advisory lock held for every read and read-modify-write
//! tasks.json.corrupt  # previous contents, when an unparsable file was set aside
//! ```
//!
//! A bare JSON array of records is also accepted on read. Several processes
//! may share one file; each operation holds the lock for its whole cycle.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::port::PersistencePort;
use crate::task::TaskRecord;

pub const TASKS_SCHEMA_VERSION: &str = "taskdeck.tasks.v1";

#[derive(Debug, Serialize, Deserialize)]
struct TaskFile {
    schema_version: String,
    saved_at: DateTime<Utc>,
    tasks: Vec<TaskRecord>,
}

/// Outcome of decoding the file: the records kept and what was dropped.
#[derive(Debug, Default)]
struct Decoded {
    tasks: Vec<TaskRecord>,
    discarded: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_timeout_ms: u64,
    self_heal: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            self_heal: true,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn with_self_heal(mut self, self_heal: bool) -> Self {
        self.self_heal = self_heal;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the first unparsable file is moved when self-heal is on.
    /// Later ones get a numeric suffix (`.corrupt.1`, `.corrupt.2`, ...).
    pub fn quarantine_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.corrupt", self.path.display()))
    }

    /// First quarantine path not already taken by an earlier copy.
    fn free_quarantine_path(&self) -> PathBuf {
        let base = self.quarantine_path();
        if !base.exists() {
            return base;
        }
        (1u32..)
            .map(|n| PathBuf::from(format!("{}.{n}", base.display())))
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)
    }

    /// Load under an already-held lock, healing if allowed.
    fn load(&self) -> Result<Vec<TaskRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::Io(err)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let decoded = match decode(&content) {
            Ok(decoded) => decoded,
            Err(reason) if self.self_heal => {
                let quarantine = self.free_quarantine_path();
                fs::rename(&self.path, &quarantine)?;
                tracing::warn!(
                    path = %self.path.display(),
                    moved_to = %quarantine.display(),
                    %reason,
                    "task file unreadable; set aside and starting empty"
                );
                return Ok(Vec::new());
            }
            Err(reason) => {
                return Err(Error::StorageCorrupt(format!(
                    "{}: {reason}",
                    self.path.display()
                )))
            }
        };

        if !decoded.discarded.is_empty() {
            if !self.self_heal {
                return Err(Error::StorageCorrupt(format!(
                    "{}: {} unreadable entries ({})",
                    self.path.display(),
                    decoded.discarded.len(),
                    decoded.discarded.join("; ")
                )));
            }
            tracing::warn!(
                path = %self.path.display(),
                discarded = decoded.discarded.len(),
                entries = ?decoded.discarded,
                "discarded unreadable task entries"
            );
            self.save(&decoded.tasks)?;
        }

        Ok(decoded.tasks)
    }

    fn save(&self, tasks: &[TaskRecord]) -> Result<()> {
        let file = TaskFile {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            saved_at: Utc::now(),
            tasks: tasks.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        lock::write_atomic(&self.path, json.as_bytes())
    }

    fn read<T>(&self, f: impl FnOnce(Vec<TaskRecord>) -> Result<T>) -> Result<T> {
        let _lock = self.lock()?;
        let tasks = self.load()?;
        f(tasks)
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Vec<TaskRecord>) -> Result<T>) -> Result<T> {
        let _lock = self.lock()?;
        let mut tasks = self.load()?;
        let result = f(&mut tasks)?;
        self.save(&tasks)?;
        Ok(result)
    }

    /// Run a synchronous file operation off the async executor.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|err| Error::Unknown(format!("file store task failed: {err}")))?
            .map_err(|err| storage_error(&path, err))
    }
}

fn decode(content: &str) -> std::result::Result<Decoded, String> {
    let value: serde_json::Value = serde_json::from_str(content).map_err(|e| e.to_string())?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut map) => match map.remove("tasks") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => return Err("missing \"tasks\" array".to_string()),
        },
        _ => return Err("expected an object or an array".to_string()),
    };

    let mut decoded = Decoded::default();
    let mut seen = HashSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let record: TaskRecord = match serde_json::from_value(entry) {
            Ok(record) => record,
            Err(err) => {
                decoded.discarded.push(format!("#{index}: {err}"));
                continue;
            }
        };
        if let Err(err) = record.check_invariants() {
            decoded.discarded.push(format!("#{index} ({}): {err}", record.id));
            continue;
        }
        if !seen.insert(record.id.clone()) {
            decoded
                .discarded
                .push(format!("#{index} ({}): duplicate id", record.id));
            continue;
        }
        decoded.tasks.push(record);
    }
    Ok(decoded)
}

/// Fold local failures into the storage taxonomy.
fn storage_error(path: &Path, err: Error) -> Error {
    match err {
        Error::Io(err) => Error::StorageUnavailable(format!("{}: {err}", path.display())),
        Error::LockFailed(lock_path) => Error::StorageUnavailable(format!(
            "timed out waiting for lock {}",
            lock_path.display()
        )),
        Error::Json(err) => Error::StorageCorrupt(format!("{}: {err}", path.display())),
        other => other,
    }
}

impl PersistencePort for FileStore {
    async fn find_all(&self) -> Result<Vec<TaskRecord>> {
        self.blocking(|store| store.read(Ok)).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        let id = id.to_string();
        self.blocking(move |store| {
            store.read(|tasks| Ok(tasks.into_iter().find(|task| task.id == id)))
        })
        .await
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        self.blocking(move |store| {
            store.modify(|tasks| {
                if tasks.iter().any(|task| task.id == record.id) {
                    return Err(Error::DuplicateId(record.id.clone()));
                }
                tasks.push(record.clone());
                Ok(record)
            })
        })
        .await
    }

    async fn update(&self, record: TaskRecord) -> Result<TaskRecord> {
        self.blocking(move |store| {
            store.modify(|tasks| {
                let slot = tasks
                    .iter_mut()
                    .find(|task| task.id == record.id)
                    .ok_or_else(|| Error::NotFound(record.id.clone()))?;
                *slot = record.clone();
                Ok(record)
            })
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |store| {
            store.modify(|tasks| {
                let before = tasks.len();
                tasks.retain(|task| task.id != id);
                if tasks.len() == before {
                    return Err(Error::NotFound(id.clone()));
                }
                Ok(())
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskInput;
    use tempfile::TempDir;

    fn record(id: &str) -> TaskRecord {
        TaskRecord::from_input(TaskInput::new(format!("task {id}")), id.to_string(), Utc::now())
    }

    #[test]
    fn decode_accepts_bare_array_and_envelope() {
        let a = serde_json::to_string(&vec![record("a")]).unwrap();
        assert_eq!(decode(&a).unwrap().tasks.len(), 1);

        let wrapped = format!(r#"{{"schema_version":"x","tasks":{a}}}"#);
        assert_eq!(decode(&wrapped).unwrap().tasks.len(), 1);

        assert!(decode("42").is_err());
        assert!(decode(r#"{"tasks": 1}"#).is_err());
        assert!(decode("{not json").is_err());
    }

    #[test]
    fn decode_drops_bad_and_duplicate_entries() {
        let good = serde_json::to_value(record("a")).unwrap();
        let dup = serde_json::to_value(record("a")).unwrap();
        let content = serde_json::json!([good, {"id": "b"}, dup, "junk"]).to_string();

        let decoded = decode(&content).unwrap();
        assert_eq!(decoded.tasks.len(), 1);
        assert_eq!(decoded.discarded.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("tasks.json"));
        assert!(store.find_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn writes_versioned_envelope() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("tasks.json"));
        store.create(record("a")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["schema_version"], TASKS_SCHEMA_VERSION);
        assert_eq!(raw["tasks"][0]["id"], "a");
    }

    #[tokio::test]
    async fn io_failures_map_to_storage_unavailable() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be cannot be read as a file.
        let path = dir.path().join("tasks.json");
        fs::create_dir_all(&path).unwrap();
        let store = FileStore::new(&path);

        let err = store.find_all().await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)), "{err:?}");
    }
}
