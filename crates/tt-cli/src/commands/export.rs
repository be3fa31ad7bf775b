//! Export command: dump matching events as JSON, JSON Lines or CSV.

use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tt_core::{Event, SessionId};
use tt_db::{Database, EventFilter};

use crate::cli::ExportFormat;

/// An exported event with its derived duration.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(flatten)]
    event: &'a Event,
    duration_ms: i64,
    project_key: String,
}

impl<'a> ExportRow<'a> {
    fn new(event: &'a Event) -> Self {
        Self {
            event,
            duration_ms: event.duration_ms(),
            project_key: event.project_key(),
        }
    }
}

const CSV_COLUMNS: [&str; 12] = [
    "id",
    "started_at",
    "finished_at",
    "duration_s",
    "exit_code",
    "cwd",
    "command",
    "tag",
    "project",
    "category",
    "session_id",
    "session_name",
];

/// One CSV record, in [`CSV_COLUMNS`] order.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: i64,
    started_at: String,
    finished_at: String,
    duration_s: String,
    exit_code: Option<i32>,
    cwd: Option<&'a str>,
    command: &'a str,
    tag: Option<&'a str>,
    project: Option<&'a str>,
    category: &'static str,
    session_id: Option<i64>,
    session_name: Option<&'a str>,
}

fn csv_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl<'a> CsvRow<'a> {
    fn new(event: &'a Event, session_names: &'a HashMap<SessionId, String>) -> Self {
        let ms = event.duration_ms();
        Self {
            id: event.id.get(),
            started_at: csv_timestamp(event.started_at),
            finished_at: csv_timestamp(event.ended_at),
            duration_s: format!("{}.{:03}", ms / 1000, ms % 1000),
            exit_code: event.exit_code,
            cwd: event.cwd.as_deref(),
            command: &event.command,
            tag: event.tag.as_deref(),
            project: event.project.as_deref(),
            category: event.category.as_str(),
            session_id: event.session_id.map(SessionId::get),
            session_name: event
                .session_id
                .and_then(|id| session_names.get(&id))
                .map(String::as_str),
        }
    }
}

fn write_csv<W: Write>(writer: &mut W, db: &Database, events: &[Event]) -> Result<()> {
    let session_names: HashMap<SessionId, String> = db
        .list_sessions(None)?
        .into_iter()
        .map(|session| (session.id, session.name))
        .collect();

    // Header written by hand so an empty export still has one
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    out.write_record(CSV_COLUMNS)?;
    for event in events {
        out.serialize(CsvRow::new(event, &session_names))?;
    }
    out.flush()?;
    Ok(())
}

/// Writes every event matching `filter` and returns how many were written.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    format: ExportFormat,
    filter: &EventFilter,
) -> Result<usize> {
    let (events, stats) = db.list_events(filter)?;
    if stats.skipped > 0 {
        tracing::warn!(skipped = stats.skipped, "export excludes unreadable events");
    }

    match format {
        ExportFormat::Json => {
            let rows: Vec<ExportRow<'_>> = events.iter().map(ExportRow::new).collect();
            serde_json::to_writer_pretty(&mut *writer, &rows)?;
            writeln!(writer)?;
        }
        ExportFormat::Jsonl => {
            for event in &events {
                serde_json::to_writer(&mut *writer, &ExportRow::new(event))?;
                writeln!(writer)?;
            }
        }
        ExportFormat::Csv => write_csv(writer, db, &events)?,
    }

    Ok(events.len())
}
