//! Record command: store a command that already ran.
//!
//! Shell hooks call this after every prompt, so it prints nothing for
//! ignored commands and only a short confirmation otherwise.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tt_db::Database;

use crate::Config;
use crate::capture::{CaptureOutcome, CaptureRequest, CommandPolicy, capture};
use crate::commands::util::parse_timestamp;

#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub started: String,
    pub finished: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub cwd: Option<PathBuf>,
    pub project: Option<String>,
    pub tag: Option<String>,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    config: &Config,
    options: RecordOptions,
) -> Result<()> {
    let started_at = parse_timestamp(&options.started).context("invalid --started")?;
    let ended_at = parse_timestamp(&options.finished).context("invalid --finished")?;
    let cwd = match options.cwd {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    let request = CaptureRequest {
        command: CommandPolicy::from_config(config).from_line(&options.command),
        started_at,
        ended_at,
        exit_code: options.exit_code,
        cwd: Some(cwd.display().to_string()),
        project: options.project,
        tag: options.tag,
    }
    .with_env_defaults();

    let filter = db.ignore_filter()?;
    if let CaptureOutcome::Recorded(event) = capture(db, &filter, request)? {
        writeln!(writer, "Saved event #{}", event.id)?;
    }
    Ok(())
}
