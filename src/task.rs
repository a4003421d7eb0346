//! Task records and the rules every record obeys.
//!
//! A [`TaskRecord`] is stamped with its id and timestamps when created and
//! is never reassigned another id. Every mutation refreshes `updated_at`,
//! which never falls behind `created_at`.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::TasksConfig;
use crate::deadline::{self, DeadlineStatus};
use crate::error::{Error, Result};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_PERSON: &str = "personInCharge";
pub const FIELD_START_DATE: &str = "startDate";
pub const FIELD_END_DATE: &str = "endDate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_in_charge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Build a fresh record from already-validated input.
    pub fn from_input(input: TaskInput, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title,
            description: input.description,
            person_in_charge: input.person_in_charge,
            start_date: input.start_date,
            end_date: input.end_date,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stamp a mutation. Clamped so `updated_at >= created_at` survives
    /// a clock that moved backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// Copy with `completed` flipped and a fresh `updated_at`.
    pub fn toggled(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.completed = !next.completed;
        next.touch(now);
        next
    }

    pub fn deadline(&self, today: NaiveDate) -> Option<DeadlineStatus> {
        deadline::classify(self.completed, self.end_date, today)
    }

    /// A record a report can render: both id and title present.
    pub fn is_exportable(&self) -> bool {
        !self.id.trim().is_empty() && !self.title.trim().is_empty()
    }

    /// Structural invariants that hold for every stored record.
    pub fn check_invariants(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("id", "cannot be empty"));
        }
        if self.title.trim().is_empty() {
            return Err(Error::validation(FIELD_TITLE, "cannot be empty"));
        }
        if self.updated_at < self.created_at {
            return Err(Error::validation(
                "updatedAt",
                "cannot be earlier than createdAt",
            ));
        }
        check_date_order(self.start_date, self.end_date)
    }
}

/// User-supplied fields for a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub person_in_charge: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn person_in_charge(mut self, person: impl Into<String>) -> Self {
        self.person_in_charge = Some(person.into());
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Trim text fields and check them against `policy`.
    ///
    /// Fields are checked in declaration order and the first violation is
    /// returned. `today` is used to reject required start dates in the past.
    pub fn validate(self, policy: &TasksConfig, today: NaiveDate) -> Result<TaskInput> {
        let normalized = TaskInput {
            title: self.title.trim().to_string(),
            description: normalize_optional(self.description),
            person_in_charge: normalize_optional(self.person_in_charge),
            start_date: self.start_date,
            end_date: self.end_date,
        };
        validate_fields(&normalized, policy, Some(today))?;
        Ok(normalized)
    }
}

/// Partial update of an existing task. `None` leaves a field unchanged;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub person_in_charge: Option<Option<String>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.person_in_charge.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// Apply onto `record`, validating the merged result.
    pub fn apply(
        &self,
        record: &TaskRecord,
        policy: &TasksConfig,
        now: DateTime<Utc>,
    ) -> Result<TaskRecord> {
        let merged = TaskInput {
            title: self
                .title
                .as_deref()
                .unwrap_or(&record.title)
                .trim()
                .to_string(),
            description: normalize_optional(
                self.description
                    .clone()
                    .unwrap_or_else(|| record.description.clone()),
            ),
            person_in_charge: normalize_optional(
                self.person_in_charge
                    .clone()
                    .unwrap_or_else(|| record.person_in_charge.clone()),
            ),
            start_date: self.start_date.unwrap_or(record.start_date),
            end_date: self.end_date.unwrap_or(record.end_date),
        };
        validate_fields(&merged, policy, None)?;

        let mut next = record.clone();
        next.title = merged.title;
        next.description = merged.description;
        next.person_in_charge = merged.person_in_charge;
        next.start_date = merged.start_date;
        next.end_date = merged.end_date;
        next.touch(now);
        Ok(next)
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn validate_fields(
    input: &TaskInput,
    policy: &TasksConfig,
    creation_day: Option<NaiveDate>,
) -> Result<()> {
    if input.title.is_empty() {
        return Err(Error::validation(FIELD_TITLE, "cannot be empty"));
    }
    let title_len = input.title.chars().count();
    if title_len > TITLE_MAX_CHARS {
        return Err(Error::validation(
            FIELD_TITLE,
            format!("must be at most {TITLE_MAX_CHARS} characters (got {title_len})"),
        ));
    }

    if let Some(description) = &input.description {
        let len = description.chars().count();
        if len > DESCRIPTION_MAX_CHARS {
            return Err(Error::validation(
                FIELD_DESCRIPTION,
                format!("must be at most {DESCRIPTION_MAX_CHARS} characters (got {len})"),
            ));
        }
    }

    match &input.person_in_charge {
        Some(person) => {
            let known = policy.people.iter().any(|p| p.trim() == person.as_str());
            if !policy.people.is_empty() && !known {
                return Err(Error::validation(
                    FIELD_PERSON,
                    format!(
                        "'{person}' is not one of: {}",
                        policy.people.join(", ")
                    ),
                ));
            }
        }
        None if policy.require_person_in_charge => {
            return Err(Error::validation(FIELD_PERSON, "is required"));
        }
        None => {}
    }

    match (input.start_date, creation_day) {
        (None, _) if policy.require_start_date => {
            return Err(Error::validation(FIELD_START_DATE, "is required"));
        }
        (Some(start), Some(today)) if policy.require_start_date && start < today => {
            return Err(Error::validation(
                FIELD_START_DATE,
                format!("cannot be in the past ({start} is before {today})"),
            ));
        }
        _ => {}
    }

    if input.end_date.is_none() && policy.require_end_date {
        return Err(Error::validation(FIELD_END_DATE, "is required"));
    }
    check_date_order(input.start_date, input.end_date)
}

fn check_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(Error::validation(
                FIELD_END_DATE,
                format!("{end} is before start date {start}"),
            ));
        }
    }
    Ok(())
}

/// New opaque task id (lowercase ULID, time-ordered).
pub fn generate_task_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Display order: open before completed, then by deadline urgency, then
/// earliest end date, then most recently updated, then id.
pub fn sort_tasks(tasks: &mut [TaskRecord], today: NaiveDate) {
    tasks.sort_by(|left, right| compare_for_display(left, right, today));
}

fn compare_for_display(left: &TaskRecord, right: &TaskRecord, today: NaiveDate) -> Ordering {
    let left_urgency = DeadlineStatus::urgency(left.deadline(today).as_ref());
    let right_urgency = DeadlineStatus::urgency(right.deadline(today).as_ref());
    left.completed
        .cmp(&right.completed)
        .then_with(|| left_urgency.cmp(&right_urgency))
        .then_with(|| match (left.end_date, right.end_date) {
            (Some(l), Some(r)) => l.cmp(&r),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| right.updated_at.cmp(&left.updated_at))
        .then_with(|| left.id.cmp(&right.id))
}
