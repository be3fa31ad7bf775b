//! Turning a finished command into a stored event.
//!
//! Both `run` and `record` funnel through [`capture`]: validate the timing,
//! consult the ignore rules, and append the event to whatever session is
//! open when the write commits.

use chrono::{DateTime, Utc};
use tt_core::{Event, IgnoreFilter, NewEvent, ValidationError, categorize, sanitize};
use tt_db::{Database, DbError};

use crate::Config;

pub const PROJECT_ENV: &str = "TIMETRACE_PROJECT";
pub const TAG_ENV: &str = "TIMETRACE_TAG";

/// A finished command waiting to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub cwd: Option<String>,
    pub project: Option<String>,
    pub tag: Option<String>,
}

impl CaptureRequest {
    /// Fills a missing project or tag from `TIMETRACE_PROJECT`/`TIMETRACE_TAG`.
    #[must_use]
    pub fn with_env_defaults(self) -> Self {
        self.with_defaults_from(|name| std::env::var(name).ok())
    }

    fn with_defaults_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let from_env = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if blank(self.project.as_deref()) {
            self.project = from_env(PROJECT_ENV);
        }
        if blank(self.tag.as_deref()) {
            self.tag = from_env(TAG_ENV);
        }
        self
    }
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Recorded(Event),
    /// Matched an ignore rule (or was blank); nothing was written.
    Ignored,
}

/// How raw command text is cleaned before recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    pub redact_secrets: bool,
    pub max_command_len: usize,
}

impl CommandPolicy {
    pub const fn from_config(config: &Config) -> Self {
        Self {
            redact_secrets: config.redact_secrets,
            max_command_len: config.max_command_len,
        }
    }

    /// Command text for an argv the CLI is about to execute.
    pub fn from_args<S: AsRef<str>>(&self, args: &[S]) -> String {
        let text = if self.redact_secrets {
            sanitize::sanitize_args(args)
        } else {
            args.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
        };
        sanitize::truncate(&text, self.max_command_len)
    }

    /// Command text for a line reported by a shell hook.
    pub fn from_line(&self, line: &str) -> String {
        let text = if self.redact_secrets {
            sanitize::sanitize_command_line(line)
        } else {
            line.trim().to_string()
        };
        sanitize::truncate(&text, self.max_command_len)
    }
}

/// Records a finished command unless an ignore rule excludes it.
///
/// Nothing is written when validation fails or the command is ignored.
pub fn capture(
    db: &mut Database,
    filter: &IgnoreFilter,
    request: CaptureRequest,
) -> Result<CaptureOutcome, DbError> {
    if request.ended_at < request.started_at {
        return Err(ValidationError::InvalidDuration {
            started_at: request.started_at.to_rfc3339(),
            ended_at: request.ended_at.to_rfc3339(),
        }
        .into());
    }

    let command = request.command.trim();
    if command.is_empty() {
        tracing::debug!("blank command, nothing to record");
        return Ok(CaptureOutcome::Ignored);
    }
    if let Some(rule) = filter.first_match(command) {
        tracing::debug!(command, %rule, "command matches ignore rule");
        return Ok(CaptureOutcome::Ignored);
    }

    let event = NewEvent {
        command: command.to_string(),
        started_at: request.started_at,
        ended_at: request.ended_at,
        exit_code: request.exit_code,
        cwd: request.cwd,
        project: request.project.filter(|p| !p.trim().is_empty()),
        tag: request.tag.filter(|t| !t.trim().is_empty()),
        category: categorize(command),
    };
    let event = db.append_event_in_current_session(event)?;
    Ok(CaptureOutcome::Recorded(event))
}
