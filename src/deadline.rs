//! Deadline status derivation.
//!
//! Pure classification of `(completed, end_date, today)` used for display
//! and ordering. Nothing here is persisted.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Days-remaining threshold for the near-term warning band
pub const DUE_SOON_DAYS: i64 = 3;
/// Days-remaining threshold for the informational band
pub const UPCOMING_DAYS: i64 = 7;

/// Classification of a task's deadline relative to the current date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeadlineStatus {
    Completed,
    /// `days` is how far past the end date, always >= 1
    Overdue { days: i64 },
    DueToday,
    DueTomorrow,
    /// 2..=3 days left
    DueSoon { days: i64 },
    /// 4..=7 days left
    Upcoming { days: i64 },
    /// more than 7 days left
    Distant { days: i64 },
}

impl DeadlineStatus {
    /// Signed whole days until the end date, when one applies.
    pub fn days_remaining(&self) -> Option<i64> {
        match *self {
            DeadlineStatus::Completed => None,
            DeadlineStatus::Overdue { days } => Some(-days),
            DeadlineStatus::DueToday => Some(0),
            DeadlineStatus::DueTomorrow => Some(1),
            DeadlineStatus::DueSoon { days }
            | DeadlineStatus::Upcoming { days }
            | DeadlineStatus::Distant { days } => Some(days),
        }
    }

    /// Sort rank, most pressing first. Tasks without a deadline rank
    /// between distant deadlines and completed tasks.
    pub fn urgency(status: Option<&DeadlineStatus>) -> u8 {
        match status {
            Some(DeadlineStatus::Overdue { .. }) => 0,
            Some(DeadlineStatus::DueToday) => 1,
            Some(DeadlineStatus::DueTomorrow) => 2,
            Some(DeadlineStatus::DueSoon { .. }) => 3,
            Some(DeadlineStatus::Upcoming { .. }) => 4,
            Some(DeadlineStatus::Distant { .. }) => 5,
            None => 6,
            Some(DeadlineStatus::Completed) => 7,
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, DeadlineStatus::Overdue { .. })
    }

    /// Today, tomorrow, or within the near-term warning band.
    pub fn is_due_soon(&self) -> bool {
        matches!(
            self,
            DeadlineStatus::DueToday | DeadlineStatus::DueTomorrow | DeadlineStatus::DueSoon { .. }
        )
    }
}

impl fmt::Display for DeadlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlineStatus::Completed => write!(f, "completed"),
            DeadlineStatus::Overdue { days } => write!(f, "overdue by {days} days"),
            DeadlineStatus::DueToday => write!(f, "due today"),
            DeadlineStatus::DueTomorrow => write!(f, "due tomorrow"),
            DeadlineStatus::DueSoon { days } => write!(f, "due in {days} days"),
            DeadlineStatus::Upcoming { days } | DeadlineStatus::Distant { days } => {
                write!(f, "{days} days remaining")
            }
        }
    }
}

/// The local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Classify a task against `today`.
///
/// Completion always wins; a task with no end date has no deadline status.
pub fn classify(
    completed: bool,
    end_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<DeadlineStatus> {
    if completed {
        return Some(DeadlineStatus::Completed);
    }
    let end_date = end_date?;
    let days = end_date.signed_duration_since(today).num_days();
    let status = match days {
        d if d < 0 => DeadlineStatus::Overdue { days: -d },
        0 => DeadlineStatus::DueToday,
        1 => DeadlineStatus::DueTomorrow,
        d if d <= DUE_SOON_DAYS => DeadlineStatus::DueSoon { days: d },
        d if d <= UPCOMING_DAYS => DeadlineStatus::Upcoming { days: d },
        d => DeadlineStatus::Distant { days: d },
    };
    Some(status)
}

/// Classify against a wall-clock instant, truncated to its calendar date
/// in the instant's own timezone.
pub fn classify_at<Tz: TimeZone>(
    completed: bool,
    end_date: Option<NaiveDate>,
    now: &DateTime<Tz>,
) -> Option<DeadlineStatus> {
    classify(completed, end_date, now.date_naive())
}

/// Classify from an untyped end date. Unparsable input yields no status.
pub fn classify_raw(
    completed: bool,
    end_date: Option<&str>,
    today: NaiveDate,
) -> Option<DeadlineStatus> {
    classify(completed, end_date.and_then(parse_date_lenient), today)
}

/// Parse `YYYY-MM-DD`, `YYYY/MM/DD`, or an RFC 3339 timestamp (date part
/// only, in the timestamp's own offset).
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y/%m/%d"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|ts| ts.date_naive())
        })
}
