//! Task reports built from a synchronizer snapshot.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::task::{sort_tasks, TaskRecord};

/// Turns a consistent list of tasks into some output artifact.
///
/// Implementations only ever see records that carry both an id and a title.
pub trait ReportExporter {
    type Output;

    fn export(&self, tasks: &[TaskRecord], today: NaiveDate) -> Result<Self::Output>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub due_soon: usize,
    pub no_deadline: usize,
}

impl ReportSummary {
    pub fn from_tasks(tasks: &[TaskRecord], today: NaiveDate) -> Self {
        let mut summary = ReportSummary {
            total: tasks.len(),
            ..ReportSummary::default()
        };
        for task in tasks {
            if task.completed {
                summary.completed += 1;
                continue;
            }
            summary.pending += 1;
            match task.deadline(today) {
                Some(status) if status.is_overdue() => summary.overdue += 1,
                Some(status) if status.is_due_soon() => summary.due_soon += 1,
                Some(_) => {}
                None => summary.no_deadline += 1,
            }
        }
        summary
    }
}

/// Plain-text report, one line per task in display order.
#[derive(Debug, Clone)]
pub struct TextReport {
    title: String,
}

impl TextReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for TextReport {
    fn default() -> Self {
        Self::new("Task report")
    }
}

impl ReportExporter for TextReport {
    type Output = String;

    fn export(&self, tasks: &[TaskRecord], today: NaiveDate) -> Result<String> {
        let summary = ReportSummary::from_tasks(tasks, today);
        let mut ordered = tasks.to_vec();
        sort_tasks(&mut ordered, today);

        let mut lines = vec![
            self.title.clone(),
            format!("Generated: {today}"),
            String::new(),
            "Summary:".to_string(),
            format!("- total: {}", summary.total),
            format!("- completed: {}", summary.completed),
            format!("- pending: {}", summary.pending),
            format!("- overdue: {}", summary.overdue),
            format!("- due soon: {}", summary.due_soon),
        ];

        if !ordered.is_empty() {
            lines.push(String::new());
            lines.push("Tasks:".to_string());
            for task in &ordered {
                lines.push(format!("- {}", task_line(task, today)));
            }
        }

        Ok(lines.join("\n"))
    }
}

/// Structured report for `--json` callers.
#[derive(Debug, Clone, Default)]
pub struct JsonReport;

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub task: TaskRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub generated_on: NaiveDate,
    pub summary: ReportSummary,
    pub tasks: Vec<ReportEntry>,
}

impl ReportExporter for JsonReport {
    type Output = ReportDocument;

    fn export(&self, tasks: &[TaskRecord], today: NaiveDate) -> Result<ReportDocument> {
        let mut ordered = tasks.to_vec();
        sort_tasks(&mut ordered, today);
        Ok(ReportDocument {
            generated_on: today,
            summary: ReportSummary::from_tasks(tasks, today),
            tasks: ordered
                .into_iter()
                .map(|task| ReportEntry {
                    status: task.deadline(today).map(|status| status.to_string()),
                    task,
                })
                .collect(),
        })
    }
}

/// `[x] title (person) start..end  status` with absent parts left out.
pub fn task_line(task: &TaskRecord, today: NaiveDate) -> String {
    let mark = if task.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {}", task.title);
    if let Some(person) = &task.person_in_charge {
        line.push_str(&format!(" ({person})"));
    }
    match (task.start_date, task.end_date) {
        (Some(start), Some(end)) => line.push_str(&format!(" {start}..{end}")),
        (Some(start), None) => line.push_str(&format!(" from {start}")),
        (None, Some(end)) => line.push_str(&format!(" until {end}")),
        (None, None) => {}
    }
    if let Some(status) = task.deadline(today) {
        line.push_str(&format!("  {status}"));
    }
    line
}
