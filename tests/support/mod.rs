#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use assert_cmd::Command;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use taskdeck::error::{Error, Result};
use taskdeck::port::{MemoryPort, PersistencePort};
use taskdeck::task::{TaskInput, TaskRecord};
use tempfile::TempDir;

/// Per-operation call counts observed by a [`ScriptedPort`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub find_all: usize,
    pub find_by_id: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

#[derive(Default)]
struct Script {
    calls: Calls,
    fail_find_all: Option<Error>,
    fail_create: Option<Error>,
    fail_update: Option<Error>,
    fail_update_after_write: Option<Error>,
    fail_delete: Option<Error>,
}

/// Memory-backed port that yields before every call, counts calls, and
/// can be told to fail the next call of a given kind.
///
/// The yield gives concurrently joined operations a chance to interleave
/// the way they would against real I/O.
#[derive(Clone, Default)]
pub struct ScriptedPort {
    inner: MemoryPort,
    script: Arc<Mutex<Script>>,
}

impl ScriptedPort {
    pub fn new(records: Vec<TaskRecord>) -> Self {
        Self {
            inner: MemoryPort::with_records(records),
            script: Arc::default(),
        }
    }

    /// The underlying storage, for writes that bypass the synchronizer.
    pub fn storage(&self) -> &MemoryPort {
        &self.inner
    }

    pub fn calls(&self) -> Calls {
        self.script.lock().calls
    }

    pub fn fail_next_find_all(&self, err: Error) {
        self.script.lock().fail_find_all = Some(err);
    }

    pub fn fail_next_create(&self, err: Error) {
        self.script.lock().fail_create = Some(err);
    }

    pub fn fail_next_update(&self, err: Error) {
        self.script.lock().fail_update = Some(err);
    }

    /// The next update is stored but reported as failed.
    pub fn fail_next_update_after_write(&self, err: Error) {
        self.script.lock().fail_update_after_write = Some(err);
    }

    pub fn fail_next_delete(&self, err: Error) {
        self.script.lock().fail_delete = Some(err);
    }
}

impl PersistencePort for ScriptedPort {
    async fn find_all(&self) -> Result<Vec<TaskRecord>> {
        tokio::task::yield_now().await;
        let failure = {
            let mut script = self.script.lock();
            script.calls.find_all += 1;
            script.fail_find_all.take()
        };
        match failure {
            Some(err) => Err(err),
            None => self.inner.find_all().await,
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        tokio::task::yield_now().await;
        self.script.lock().calls.find_by_id += 1;
        self.inner.find_by_id(id).await
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        tokio::task::yield_now().await;
        let failure = {
            let mut script = self.script.lock();
            script.calls.create += 1;
            script.fail_create.take()
        };
        match failure {
            Some(err) => Err(err),
            None => self.inner.create(record).await,
        }
    }

    async fn update(&self, record: TaskRecord) -> Result<TaskRecord> {
        tokio::task::yield_now().await;
        let (failure, after_write) = {
            let mut script = self.script.lock();
            script.calls.update += 1;
            (script.fail_update.take(), script.fail_update_after_write.take())
        };
        if let Some(err) = failure {
            return Err(err);
        }
        let stored = self.inner.update(record).await?;
        match after_write {
            Some(err) => Err(err),
            None => Ok(stored),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        tokio::task::yield_now().await;
        let failure = {
            let mut script = self.script.lock();
            script.calls.delete += 1;
            script.fail_delete.take()
        };
        match failure {
            Some(err) => Err(err),
            None => self.inner.delete(id).await,
        }
    }
}

pub fn record(id: &str) -> TaskRecord {
    TaskRecord::from_input(TaskInput::new(format!("task {id}")), id.to_string(), Utc::now())
}

pub fn record_due(id: &str, end: NaiveDate) -> TaskRecord {
    TaskRecord::from_input(
        TaskInput::new(format!("task {id}")).end_date(end),
        id.to_string(),
        Utc::now(),
    )
}

pub fn ids(tasks: &[TaskRecord]) -> Vec<String> {
    let mut ids: Vec<String> = tasks.iter().map(|task| task.id.clone()).collect();
    ids.sort();
    ids
}

/// A scratch directory with its own task file.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("tasks.json")
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join(".taskdeck.toml");
        std::fs::write(&path, contents).expect("write config");
        path
    }

    /// `taskdeck` running inside this directory against its task file.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskdeck").expect("binary");
        cmd.current_dir(self.dir.path())
            .env("TASKDECK_STORE", self.store_path())
            .env_remove("TASKDECK_CONFIG")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Run with `--json` and parse stdout, whatever the exit status.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run taskdeck");
        serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
            panic!(
                "stdout was not JSON ({err}): {}",
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }
}
