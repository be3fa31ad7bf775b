//! Run command: execute a command and record its wall-clock time.

use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use chrono::Utc;
use tt_db::Database;

use crate::Config;
use crate::capture::{CaptureOutcome, CaptureRequest, CommandPolicy, capture};
use crate::commands::util::format_duration;
use crate::exit::{COMMAND_NOT_FOUND, FAILURE};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub project: Option<String>,
    pub tag: Option<String>,
    pub cwd: Option<PathBuf>,
    pub command: Vec<String>,
}

/// Runs the command and returns the exit status to report.
///
/// Status lines go to `writer` (stderr in the binary) so the wrapped
/// command's own stdout stays untouched. A recording failure is an error
/// only when the command itself succeeded; otherwise the command's status
/// wins and the failure is reported as a warning.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    options: RunOptions,
) -> Result<u8> {
    let (program, args) = options
        .command
        .split_first()
        .context("no command given; usage: timetrace run -- <command...>")?;
    let cwd = match options.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let filter = db.ignore_filter()?;
    let command_text = CommandPolicy::from_config(config).from_args(&options.command);

    tracing::debug!(program = %program, cwd = %cwd.display(), "running command");
    let started_at = Utc::now();
    let status = Command::new(program).args(args).current_dir(&cwd).status();
    let ended_at = Utc::now();

    let status = match status {
        Ok(status) => status,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            writeln!(writer, "Error: command not found: {program}")?;
            return Ok(COMMAND_NOT_FOUND);
        }
        Err(err) => return Err(err).with_context(|| format!("failed to run {program}")),
    };
    let exit_code = status.code();
    let child_status = exit_code.map_or(FAILURE, |code| u8::try_from(code).unwrap_or(FAILURE));

    let duration = format_duration((ended_at - started_at).num_milliseconds());
    match exit_code {
        Some(0) => writeln!(writer, "✔ Finished in {duration} (exit 0)")?,
        Some(code) => writeln!(writer, "✖ Finished in {duration} (exit {code})")?,
        None => writeln!(writer, "✖ Finished in {duration} (terminated by signal)")?,
    }

    let request = CaptureRequest {
        command: command_text,
        started_at,
        ended_at,
        exit_code,
        cwd: Some(std::path::absolute(&cwd).unwrap_or(cwd).display().to_string()),
        project: options.project,
        tag: options.tag,
    }
    .with_env_defaults();

    match capture(db, &filter, request) {
        Ok(CaptureOutcome::Recorded(event)) => {
            let mut details = vec![format!("project={}", event.project_key())];
            if let Some(tag) = &event.tag {
                details.push(format!("tag={tag}"));
            }
            if let Some(session_id) = event.session_id {
                details.push(format!("session={session_id}"));
            }
            details.push(format!("category={}", event.category));
            writeln!(writer, "Saved event #{}  {}", event.id, details.join("  "))?;
        }
        Ok(CaptureOutcome::Ignored) => {
            tracing::debug!("command not recorded");
        }
        Err(err) if child_status != 0 => {
            writeln!(writer, "Warning: failed to record event: {err}")?;
        }
        Err(err) => return Err(err).context("failed to record event"),
    }

    Ok(child_status)
}
