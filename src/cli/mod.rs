//! Command-line interface for taskdeck
//!
//! This module defines the CLI structure using clap derive macros.
//! Command bodies live in submodules; every command runs on a
//! single-threaded tokio runtime against one [`TaskSynchronizer`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::backend::Backend;
use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::sync::TaskSynchronizer;

mod report;
mod task;

/// taskdeck - personal task list
///
/// Keeps a task list in a local JSON file or behind a REST task API and
/// shows where each task stands against its deadline.
#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (defaults to ./.taskdeck.toml)
    #[arg(long, global = true, env = "TASKDECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Task store: a file path or an http(s) base URL. Overrides [store].
    #[arg(long, global = true, env = "TASKDECK_STORE")]
    pub store: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a task
    Add {
        /// Task title
        title: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List tasks, most urgent first
    #[command(alias = "ls")]
    List {
        /// Only tasks not yet completed
        #[arg(long, conflicts_with = "completed")]
        pending: bool,

        /// Only completed tasks
        #[arg(long)]
        completed: bool,
    },

    /// Show one task
    Show {
        /// Task id or unique id prefix
        id: String,
    },

    /// Flip a task between open and completed
    Toggle {
        /// Task id or unique id prefix
        id: String,
    },

    /// Change task fields
    Edit {
        /// Task id or unique id prefix
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,

        /// Clear fields: description, person, start, end
        #[arg(long, value_delimiter = ',')]
        clear: Vec<String>,
    },

    /// Delete a task
    #[command(alias = "delete")]
    Rm {
        /// Task id or unique id prefix
        id: String,
    },

    /// Compare the local view with the store and report drift
    Reconcile,

    /// Export a task report
    Report {
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report heading
        #[arg(long, default_value = "Task report")]
        title: String,
    },

    /// Stream cache change events as JSON lines until interrupted
    Watch {
        /// Seconds between reconciles (defaults to [sync] reconcile_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Optional task fields shared by `add` and `edit`.
#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    /// Free-form description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Person in charge (one of [tasks].people)
    #[arg(short, long)]
    pub person: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
}

/// Everything a command needs: resolved config, the wired store, and a
/// synchronizer whose cache has been loaded.
pub(crate) struct TaskContext {
    pub config: Config,
    pub location: String,
    pub sync: TaskSynchronizer<Backend>,
}

pub(crate) async fn load_context(
    config_path: Option<PathBuf>,
    store: Option<String>,
) -> Result<TaskContext> {
    let mut config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::load_from_dir(&std::env::current_dir()?)?,
    };
    if let Some(store) = store {
        apply_store_override(&mut config, &store);
    }

    let backend = Backend::from_config(&config.store)?;
    let location = backend.describe();
    tracing::debug!(store = %location, "opening task store");

    let sync = TaskSynchronizer::new(backend, config.tasks.clone());
    sync.refresh().await?;
    Ok(TaskContext {
        config,
        location,
        sync,
    })
}

fn apply_store_override(config: &mut Config, store: &str) {
    let store = store.trim();
    if store.starts_with("http://") || store.starts_with("https://") {
        config.store.backend = BackendKind::Remote;
        config.store.url = Some(store.to_string());
    } else {
        config.store.backend = BackendKind::File;
        config.store.path = Some(PathBuf::from(store));
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.dispatch())
    }

    async fn dispatch(self) -> Result<()> {
        let ctx = load_context(self.config, self.store).await?;
        let json = self.json;
        let quiet = self.quiet;

        match self.command {
            Commands::Add { title, fields } => {
                task::run_add(&ctx, task::AddOptions { title, fields, json, quiet }).await
            }
            Commands::List { pending, completed } => task::run_list(
                &ctx,
                task::ListOptions {
                    pending,
                    completed,
                    json,
                    quiet,
                },
            ),
            Commands::Show { id } => task::run_show(&ctx, task::ShowOptions { id, json, quiet }),
            Commands::Toggle { id } => {
                task::run_toggle(&ctx, task::ToggleOptions { id, json, quiet }).await
            }
            Commands::Edit {
                id,
                title,
                fields,
                clear,
            } => {
                task::run_edit(
                    &ctx,
                    task::EditOptions {
                        id,
                        title,
                        fields,
                        clear,
                        json,
                        quiet,
                    },
                )
                .await
            }
            Commands::Rm { id } => task::run_rm(&ctx, task::RmOptions { id, json, quiet }).await,
            Commands::Reconcile => task::run_reconcile(&ctx, json, quiet).await,
            Commands::Report { output, title } => report::run_report(
                &ctx,
                report::ReportOptions {
                    output,
                    title,
                    json,
                    quiet,
                },
            ),
            Commands::Watch { interval } => report::run_watch(ctx, interval).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_override_picks_backend_from_scheme() {
        let mut config = Config::default();
        apply_store_override(&mut config, "https://tasks.example/api");
        assert_eq!(config.store.backend, BackendKind::Remote);
        assert_eq!(config.store.url.as_deref(), Some("https://tasks.example/api"));

        apply_store_override(&mut config, "/tmp/tasks.json");
        assert_eq!(config.store.backend, BackendKind::File);
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/tasks.json")));
    }

    #[test]
    fn cli_parses_edit_with_clear_list() {
        let cli = Cli::parse_from([
            "taskdeck",
            "edit",
            "01h",
            "--title",
            "new",
            "--clear",
            "person,end",
        ]);
        match cli.command {
            Commands::Edit { id, title, clear, .. } => {
                assert_eq!(id, "01h");
                assert_eq!(title.as_deref(), Some("new"));
                assert_eq!(clear, vec!["person".to_string(), "end".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
