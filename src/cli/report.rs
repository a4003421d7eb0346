//! taskdeck report and watch commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::TaskContext;
use crate::deadline::today;
use crate::error::{ErrorNotice, Result};
use crate::events::{EventSink, SyncEvent};
use crate::lock;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::report::{JsonReport, ReportSummary, TextReport};
use crate::sync::spawn_reconciler;

/// How often `watch` checks for a new last error to print.
const ERROR_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ReportOptions {
    pub output: Option<PathBuf>,
    pub title: String,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct ReportWrittenOutput {
    path: PathBuf,
    summary: ReportSummary,
}

pub fn run_report(ctx: &TaskContext, options: ReportOptions) -> Result<()> {
    let today = today();
    let document = ctx.sync.export(&JsonReport, today)?;

    let Some(path) = options.output else {
        if options.json {
            return emit_success(
                OutputOptions {
                    json: true,
                    quiet: options.quiet,
                },
                "report",
                &document,
                None,
            );
        }
        if !options.quiet {
            println!("{}", ctx.sync.export(&TextReport::new(options.title), today)?);
        }
        return Ok(());
    };

    let body = if options.json {
        serde_json::to_string_pretty(&document)?
    } else {
        ctx.sync.export(&TextReport::new(options.title), today)?
    };
    lock::write_atomic(&path, body.as_bytes())?;
    tracing::debug!(path = %path.display(), "report written");

    let mut human = HumanOutput::new("Report written");
    human.push_summary("Path", path.display().to_string());
    human.push_summary("Tasks", document.summary.total.to_string());
    human.push_summary("Overdue", document.summary.overdue.to_string());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "report",
        &ReportWrittenOutput {
            path,
            summary: document.summary,
        },
        Some(&human),
    )
}

pub async fn run_watch(ctx: TaskContext, interval: Option<u64>) -> Result<()> {
    let every = interval.unwrap_or(ctx.config.sync.reconcile_interval_secs);
    let sync = Arc::new(ctx.sync);
    let mut events = sync.subscribe();
    let reconciler =
        (every > 0).then(|| spawn_reconciler(Arc::clone(&sync), Duration::from_secs(every)));

    let mut sink = EventSink::stdout();
    sink.emit(&SyncEvent::Refreshed {
        count: sync.tasks().len(),
    })?;

    let mut error_poll = tokio::time::interval(ERROR_POLL_INTERVAL);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    if let Err(err) = sink.emit(&event) {
                        break Err(err);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = error_poll.tick() => {
                if let Some(notice) = sync.last_error() {
                    print_notice(&notice);
                    sync.dismiss_error();
                }
            }
            _ = &mut shutdown => break Ok(()),
        }
    };

    if let Some(handle) = reconciler {
        handle.abort();
    }
    result
}

fn print_notice(notice: &ErrorNotice) {
    eprintln!(
        "warning: [{}] {} ({})",
        notice.kind,
        notice.message,
        notice.at.to_rfc3339()
    );
}
