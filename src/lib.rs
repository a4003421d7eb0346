//! taskdeck - Task List Library
//!
//! This library keeps an in-memory task list coherent with a pluggable
//! store and derives deadline status for display and reporting.
//!
//! # Core Concepts
//!
//! - **Task records**: validated, timestamped to-do items with optional
//!   owner and date range
//! - **Persistence port**: the storage contract, with memory, JSON file,
//!   and REST implementations
//! - **Synchronizer**: the cache, its in-flight guard, and drift
//!   reconciliation against the store
//! - **Deadline status**: overdue / due today / due soon classification
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskdeck.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task records, input validation, and field updates
//! - `deadline`: Deadline status derivation
//! - `port`: The persistence contract and an in-memory store
//! - `storage`: JSON file store
//! - `integrations`: REST task API store
//! - `backend`: Config-selected store
//! - `sync`: The task synchronizer
//! - `events`: Cache change notifications
//! - `report`: Report exporters
//! - `lock`: File locking and atomic writes for concurrency safety

pub mod backend;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod error;
pub mod events;
pub mod integrations;
pub mod lock;
pub mod output;
pub mod port;
pub mod report;
pub mod storage;
pub mod sync;
pub mod task;

pub use error::{Error, Result};
pub use port::PersistencePort;
pub use sync::TaskSynchronizer;
