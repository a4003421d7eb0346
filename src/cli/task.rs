//! taskdeck task command implementations.

use chrono::NaiveDate;
use serde::Serialize;

use crate::cli::{FieldArgs, TaskContext};
use crate::deadline::{self, today};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::report::{task_line, ReportEntry};
use crate::sync::{Mutation, ReconcileReport};
use crate::task::{sort_tasks, TaskInput, TaskPatch, TaskRecord};

pub struct AddOptions {
    pub title: String,
    pub fields: FieldArgs,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub pending: bool,
    pub completed: bool,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: String,
    pub json: bool,
    pub quiet: bool,
}

pub struct ToggleOptions {
    pub id: String,
    pub json: bool,
    pub quiet: bool,
}

pub struct EditOptions {
    pub id: String,
    pub title: Option<String>,
    pub fields: FieldArgs,
    pub clear: Vec<String>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub id: String,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<ReportEntry>,
}

#[derive(Serialize)]
struct TaskDeleteOutput {
    id: String,
    title: String,
}

#[derive(Serialize)]
struct ReconcileOutput {
    #[serde(flatten)]
    report: ReconcileReport,
    total: usize,
}

pub async fn run_add(ctx: &TaskContext, options: AddOptions) -> Result<()> {
    let input = build_input(options.title, &options.fields)?;
    let task = ctx.sync.create(input).await?;

    let today = today();
    let mut human = HumanOutput::new("Task created");
    push_task_summary(&mut human, &task, today);
    human.push_next_step(format!("taskdeck toggle {}", task.id));

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "add",
        &entry(task, today),
        Some(&human),
    )
}

pub fn run_list(ctx: &TaskContext, options: ListOptions) -> Result<()> {
    let today = today();
    let mut tasks: Vec<TaskRecord> = ctx
        .sync
        .tasks()
        .into_iter()
        .filter(|task| {
            if options.pending {
                !task.completed
            } else if options.completed {
                task.completed
            } else {
                true
            }
        })
        .collect();
    sort_tasks(&mut tasks, today);

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    human.push_summary("Store", ctx.location.clone());
    for task in &tasks {
        human.push_detail(format!("{}  {}", task.id, task_line(task, today)));
    }
    if tasks.is_empty() && !options.pending && !options.completed {
        human.push_next_step("taskdeck add \"<title>\"");
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks: tasks.into_iter().map(|task| entry(task, today)).collect(),
    };

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "list",
        &output,
        Some(&human),
    )
}

pub fn run_show(ctx: &TaskContext, options: ShowOptions) -> Result<()> {
    let resolved = resolve_task_id(&ctx.sync.tasks(), &options.id)?;
    let task = ctx
        .sync
        .get(&resolved)
        .ok_or_else(|| Error::NotFound(resolved.clone()))?;

    let today = today();
    let mut human = HumanOutput::new(format!("Task {resolved}"));
    push_task_summary(&mut human, &task, today);
    if let Some(description) = &task.description {
        human.push_detail(description.clone());
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "show",
        &entry(task, today),
        Some(&human),
    )
}

pub async fn run_toggle(ctx: &TaskContext, options: ToggleOptions) -> Result<()> {
    let resolved = resolve_task_id(&ctx.sync.tasks(), &options.id)?;
    let task = applied(ctx.sync.toggle_completion(&resolved).await?, &resolved)?;

    let today = today();
    let header = if task.completed {
        "Task completed"
    } else {
        "Task reopened"
    };
    let mut human = HumanOutput::new(header);
    push_task_summary(&mut human, &task, today);

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "toggle",
        &entry(task, today),
        Some(&human),
    )
}

pub async fn run_edit(ctx: &TaskContext, options: EditOptions) -> Result<()> {
    let resolved = resolve_task_id(&ctx.sync.tasks(), &options.id)?;
    let patch = build_patch(options.title, &options.fields, &options.clear)?;
    let task = applied(ctx.sync.update(&resolved, patch).await?, &resolved)?;

    let today = today();
    let mut human = HumanOutput::new("Task updated");
    push_task_summary(&mut human, &task, today);

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "edit",
        &entry(task, today),
        Some(&human),
    )
}

pub async fn run_rm(ctx: &TaskContext, options: RmOptions) -> Result<()> {
    let resolved = resolve_task_id(&ctx.sync.tasks(), &options.id)?;
    let task = applied(ctx.sync.remove(&resolved).await?, &resolved)?;

    let mut human = HumanOutput::new("Task deleted");
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "rm",
        &TaskDeleteOutput {
            id: task.id,
            title: task.title,
        },
        Some(&human),
    )
}

pub async fn run_reconcile(ctx: &TaskContext, json: bool, quiet: bool) -> Result<()> {
    let report = ctx.sync.reconcile().await?;
    let total = ctx.sync.tasks().len();

    let mut human = HumanOutput::new("Reconciled");
    human.push_summary("Store", ctx.location.clone());
    human.push_summary("Total", total.to_string());
    if report.drifted() {
        for id in &report.added {
            human.push_detail(format!("added {id}"));
        }
        for id in &report.removed {
            human.push_detail(format!("removed {id}"));
        }
    } else {
        human.push_summary("Drift", "none");
    }

    emit_success(
        OutputOptions { json, quiet },
        "reconcile",
        &ReconcileOutput { report, total },
        Some(&human),
    )
}

fn entry(task: TaskRecord, today: NaiveDate) -> ReportEntry {
    ReportEntry {
        status: task.deadline(today).map(|status| status.to_string()),
        task,
    }
}

fn applied(mutation: Mutation<TaskRecord>, id: &str) -> Result<TaskRecord> {
    mutation.applied().ok_or_else(|| {
        Error::Unknown(format!("another operation on task {id} is still in flight"))
    })
}

fn push_task_summary(human: &mut HumanOutput, task: &TaskRecord, today: NaiveDate) {
    human.push_summary("ID", task.id.clone());
    human.push_summary("Title", task.title.clone());
    if let Some(person) = &task.person_in_charge {
        human.push_summary("Person", person.clone());
    }
    if let Some(start) = task.start_date {
        human.push_summary("Start", start.to_string());
    }
    if let Some(end) = task.end_date {
        human.push_summary("End", end.to_string());
    }
    if let Some(status) = task.deadline(today) {
        human.push_summary("Status", status.to_string());
    }
    human.push_summary("Updated", task.updated_at.to_rfc3339());
}

fn parse_date_arg(flag: &str, raw: &str) -> Result<NaiveDate> {
    deadline::parse_date_lenient(raw).ok_or_else(|| {
        Error::InvalidArgument(format!("--{flag} expects a date like 2024-06-30, got '{raw}'"))
    })
}

fn build_input(title: String, fields: &FieldArgs) -> Result<TaskInput> {
    let mut input = TaskInput::new(title);
    if let Some(description) = &fields.description {
        input = input.description(description.clone());
    }
    if let Some(person) = &fields.person {
        input = input.person_in_charge(person.clone());
    }
    if let Some(start) = &fields.start {
        input = input.start_date(parse_date_arg("start", start)?);
    }
    if let Some(end) = &fields.end {
        input = input.end_date(parse_date_arg("end", end)?);
    }
    Ok(input)
}

fn build_patch(title: Option<String>, fields: &FieldArgs, clear: &[String]) -> Result<TaskPatch> {
    let mut patch = TaskPatch {
        title,
        description: fields.description.clone().map(Some),
        person_in_charge: fields.person.clone().map(Some),
        start_date: fields
            .start
            .as_deref()
            .map(|raw| parse_date_arg("start", raw).map(Some))
            .transpose()?,
        end_date: fields
            .end
            .as_deref()
            .map(|raw| parse_date_arg("end", raw).map(Some))
            .transpose()?,
    };

    for name in clear {
        let name = name.trim();
        // `replace` marks the field cleared; a previous `Some(Some(_))` means
        // the matching value flag was also given. Repeated clears are fine.
        let was_set = match name {
            "description" => matches!(patch.description.replace(None), Some(Some(_))),
            "person" => matches!(patch.person_in_charge.replace(None), Some(Some(_))),
            "start" => matches!(patch.start_date.replace(None), Some(Some(_))),
            "end" => matches!(patch.end_date.replace(None), Some(Some(_))),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "cannot clear '{other}' (expected description, person, start, or end)"
                )))
            }
        };
        if was_set {
            return Err(Error::InvalidArgument(format!(
                "--{name} and --clear {name} cannot be combined"
            )));
        }
    }

    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "edit requires --title, a field option, or --clear".to_string(),
        ));
    }
    Ok(patch)
}

/// Resolve a full id or a unique prefix against the cached tasks.
///
/// An input matching nothing is passed through unchanged so the
/// synchronizer can refresh and report `NotFound` itself.
fn resolve_task_id(tasks: &[TaskRecord], input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
    }
    if tasks.iter().any(|task| task.id == trimmed) {
        return Ok(trimmed.to_string());
    }

    let needle = trimmed.to_lowercase();
    let mut matches: Vec<&str> = tasks
        .iter()
        .filter(|task| task.id.to_lowercase().starts_with(&needle))
        .map(|task| task.id.as_str())
        .collect();
    matches.sort_unstable();
    matches.dedup();

    match matches.as_slice() {
        [] => Ok(trimmed.to_string()),
        [only] => Ok(only.to_string()),
        many => Err(Error::InvalidArgument(format!(
            "ambiguous task id '{trimmed}': {}",
            many.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> TaskRecord {
        TaskRecord::from_input(TaskInput::new(format!("task {id}")), id.to_string(), Utc::now())
    }

    #[test]
    fn resolve_prefers_exact_then_unique_prefix() {
        let tasks = vec![record("01hab"), record("01hac"), record("01hx")];
        assert_eq!(resolve_task_id(&tasks, "01hab").unwrap(), "01hab");
        assert_eq!(resolve_task_id(&tasks, "01HX").unwrap(), "01hx");
        assert_eq!(resolve_task_id(&tasks, " 01hac ").unwrap(), "01hac");

        let err = resolve_task_id(&tasks, "01ha").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(msg) if msg.contains("ambiguous")));
    }

    #[test]
    fn resolve_passes_unknown_ids_through() {
        let tasks = vec![record("01hab")];
        assert_eq!(resolve_task_id(&tasks, "zzz").unwrap(), "zzz");
        assert!(resolve_task_id(&tasks, "  ").is_err());
    }

    #[test]
    fn input_dates_are_parsed() {
        let fields = FieldArgs {
            end: Some("2024/06/30".to_string()),
            ..FieldArgs::default()
        };
        let input = build_input("ship".to_string(), &fields).unwrap();
        assert_eq!(input.end_date, NaiveDate::from_ymd_opt(2024, 6, 30));

        let bad = FieldArgs {
            start: Some("someday".to_string()),
            ..FieldArgs::default()
        };
        let err = build_input("ship".to_string(), &bad).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(msg) if msg.contains("--start")));
    }

    #[test]
    fn patch_combines_sets_and_clears() {
        let fields = FieldArgs {
            person: Some("team".to_string()),
            ..FieldArgs::default()
        };
        let patch = build_patch(None, &fields, &["end".to_string()]).unwrap();
        assert_eq!(patch.person_in_charge, Some(Some("team".to_string())));
        assert_eq!(patch.end_date, Some(None));
        assert!(patch.title.is_none());
    }

    #[test]
    fn patch_rejects_conflicts_and_noops() {
        let fields = FieldArgs {
            person: Some("team".to_string()),
            ..FieldArgs::default()
        };
        assert!(build_patch(None, &fields, &["person".to_string()]).is_err());
        assert!(build_patch(None, &FieldArgs::default(), &[]).is_err());
        assert!(build_patch(None, &FieldArgs::default(), &["owner".to_string()]).is_err());
    }

    #[test]
    fn patch_accepts_repeated_clear() {
        let clear = ["end".to_string(), "end".to_string()];
        let patch = build_patch(None, &FieldArgs::default(), &clear).unwrap();
        assert_eq!(patch.end_date, Some(None));
    }
}
