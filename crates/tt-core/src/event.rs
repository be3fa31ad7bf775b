//! Recorded command executions.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::types::{EventId, SessionId, ValidationError};

/// One recorded command execution.
///
/// Events are immutable once stored; the store never updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// The command text as recorded (after sanitization).
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub category: Category,
    /// The session that was open when the event was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Event {
    /// Wall-clock time spent, `ended_at - started_at`.
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration().num_milliseconds()
    }

    /// Whether the command exited with a non-zero status.
    ///
    /// Events without a recorded exit code count as successful.
    pub fn failed(&self) -> bool {
        self.exit_code.is_some_and(|code| code != 0)
    }

    /// Project key used for grouping: the explicit project, else the last
    /// component of the working directory, else `unknown`.
    pub fn project_key(&self) -> String {
        if let Some(project) = self.project.as_deref().filter(|p| !p.is_empty()) {
            return project.to_string();
        }
        self.cwd
            .as_deref()
            .map(|cwd| cwd.trim_end_matches(['/', '\\']))
            .and_then(|cwd| cwd.rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// An event that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub cwd: Option<String>,
    pub project: Option<String>,
    pub tag: Option<String>,
    pub category: Category,
}

/// Years that format as four-digit RFC 3339 and sort correctly as text.
const STORABLE_YEARS: RangeInclusive<i32> = 0..=9999;

fn check_storable(at: DateTime<Utc>) -> Result<(), ValidationError> {
    if STORABLE_YEARS.contains(&at.year()) {
        Ok(())
    } else {
        Err(ValidationError::TimestampOutOfRange {
            value: at.to_rfc3339(),
        })
    }
}

impl NewEvent {
    /// Checks the invariants the store relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.command.trim().is_empty() {
            return Err(ValidationError::Empty { field: "command" });
        }
        check_storable(self.started_at)?;
        check_storable(self.ended_at)?;
        if self.ended_at < self.started_at {
            return Err(ValidationError::InvalidDuration {
                started_at: self.started_at.to_rfc3339(),
                ended_at: self.ended_at.to_rfc3339(),
            });
        }
        Ok(())
    }

    /// Attaches the store-assigned ID and session.
    pub fn into_event(self, id: EventId, session_id: Option<SessionId>) -> Event {
        Event {
            id,
            command: self.command,
            started_at: self.started_at,
            ended_at: self.ended_at,
            exit_code: self.exit_code,
            cwd: self.cwd,
            project: self.project,
            tag: self.tag,
            category: self.category,
            session_id,
        }
    }
}
