//! Configuration loading and management
//!
//! Handles parsing of `.taskdeck.toml` configuration files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE: &str = ".taskdeck.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Which store backs the task list
    #[serde(default)]
    pub store: StoreConfig,

    /// Task validation policy
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Synchronizer behaviour
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Persistence backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    File,
    Remote,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// JSON file used by the file backend; defaults to the platform data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Base URL of the task API used by the remote backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Discard unreadable entries instead of failing reads
    #[serde(default = "default_true")]
    pub self_heal: bool,
}

fn default_backend() -> BackendKind {
    BackendKind::File
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            url: None,
            lock_timeout_ms: default_lock_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            self_heal: default_true(),
        }
    }
}

impl StoreConfig {
    /// Resolve the task file location, falling back to the platform data dir.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "taskdeck").ok_or_else(|| {
            Error::InvalidConfig(
                "store.path is not set and no home directory could be determined".to_string(),
            )
        })?;
        Ok(dirs.data_dir().join("tasks.json"))
    }
}

/// Task validation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Allowed person-in-charge labels (empty allows any label)
    #[serde(default = "default_people")]
    pub people: Vec<String>,

    #[serde(default)]
    pub require_person_in_charge: bool,

    /// Also rejects start dates in the past at creation
    #[serde(default)]
    pub require_start_date: bool,

    #[serde(default)]
    pub require_end_date: bool,
}

fn default_people() -> Vec<String> {
    vec!["owner".to_string(), "reviewer".to_string(), "team".to_string()]
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            people: default_people(),
            require_person_in_charge: false,
            require_start_date: false,
            require_end_date: false,
        }
    }
}

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between background reconciles (0 disables)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskdeck.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, or return defaults when absent
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.tasks.validate()?;
        Ok(())
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Remote {
            let url = self.url.as_deref().map(str::trim).unwrap_or("");
            if url.is_empty() {
                return Err(Error::InvalidConfig(
                    "store.url is required for the remote backend".to_string(),
                ));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::InvalidConfig(format!(
                    "store.url must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "store.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "store.request_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for person in &self.people {
            let trimmed = person.trim();
            if trimmed.is_empty() {
                return Err(Error::InvalidConfig(
                    "tasks.people cannot include empty entries".to_string(),
                ));
            }
            if !seen.insert(trimmed) {
                return Err(Error::InvalidConfig(format!(
                    "tasks.people has duplicate entry '{trimmed}'"
                )));
            }
        }
        Ok(())
    }
}
