//! Cache change notifications.
//!
//! The synchronizer publishes a [`SyncEvent`] after every change to its
//! cache. Any number of observers subscribe; a slow observer that falls
//! more than [`EVENT_CHANNEL_CAPACITY`] events behind skips ahead.
//! [`EventSink`] writes events as JSON lines for external tooling.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::Result;

pub const EVENT_SCHEMA_VERSION: &str = "taskdeck.event.v1";

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Cache replaced by a full read
    Refreshed { count: usize },
    Created { id: String },
    Updated { id: String },
    Removed { id: String },
    /// Cache replaced because storage drifted
    Reconciled {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a SyncEvent,
}

/// Writes events as JSONL.
pub struct EventSink {
    writer: Box<dyn Write + Send>,
}

impl EventSink {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }

    pub fn emit(&mut self, event: &SyncEvent) -> Result<()> {
        let envelope = Envelope {
            schema_version: EVENT_SCHEMA_VERSION,
            timestamp: Utc::now(),
            event,
        };
        serde_json::to_writer(&mut self.writer, &envelope)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
