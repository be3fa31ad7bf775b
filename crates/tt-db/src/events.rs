//! Append-only event log.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

use tt_core::{Category, Event, EventId, NewEvent, SessionId};

use crate::columns::{integer, owned, text};
use crate::{Database, DbError, format_timestamp, parse_timestamp, storage_precision};

const EVENT_COLUMNS: &str =
    "id, command, started_at, ended_at, exit_code, cwd, project, tag, category, session_id";

/// Selects which events a scan visits.
///
/// The window is half-open: `from <= started_at < to`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub session_id: Option<SessionId>,
    /// Matched against [`Event::project_key`].
    pub project: Option<String>,
    pub tag: Option<String>,
    pub category: Option<Category>,
}

impl EventFilter {
    pub fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    /// Filters that can't be expressed on stored columns alone.
    fn matches_derived(&self, event: &Event) -> bool {
        self.project
            .as_deref()
            .is_none_or(|project| event.project_key() == project)
            && self.category.is_none_or(|category| event.category == category)
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Events handed to the visitor.
    pub visited: usize,
    /// Rows that could not be decoded and were left out.
    pub skipped: usize,
}

/// Row as stored, before any type checks.
struct RawEvent {
    id: i64,
    command: Value,
    started_at: Value,
    ended_at: Value,
    exit_code: Value,
    cwd: Value,
    project: Value,
    tag: Value,
    category: Value,
    session_id: Value,
}

fn timestamp(value: Value, column: &str) -> Result<DateTime<Utc>, String> {
    let value = text(value, column)?.ok_or_else(|| format!("missing {column}"))?;
    parse_timestamp(&value)
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            command: owned(row.get_ref(1)?),
            started_at: owned(row.get_ref(2)?),
            ended_at: owned(row.get_ref(3)?),
            exit_code: owned(row.get_ref(4)?),
            cwd: owned(row.get_ref(5)?),
            project: owned(row.get_ref(6)?),
            tag: owned(row.get_ref(7)?),
            category: owned(row.get_ref(8)?),
            session_id: owned(row.get_ref(9)?),
        })
    }

    fn decode(self) -> Result<Event, String> {
        let id = EventId::new(self.id).map_err(|err| err.to_string())?;
        let command = text(self.command, "command")?
            .filter(|c| !c.trim().is_empty())
            .ok_or("missing command")?;
        let started_at = timestamp(self.started_at, "started_at")?;
        let ended_at = timestamp(self.ended_at, "ended_at")?;
        if ended_at < started_at {
            return Err(format!("ended_at {ended_at} is before started_at {started_at}"));
        }
        let exit_code = integer(self.exit_code, "exit_code")?
            .map(|code| i32::try_from(code).map_err(|_| format!("exit_code {code} is out of range")))
            .transpose()?;
        let category = text(self.category, "category")?
            .and_then(|c| c.parse().ok())
            .unwrap_or_default();
        let session_id = integer(self.session_id, "session_id")?
            .map(SessionId::new)
            .transpose()
            .map_err(|err| err.to_string())?;

        Ok(Event {
            id,
            command,
            started_at,
            ended_at,
            exit_code,
            cwd: text(self.cwd, "cwd")?,
            project: text(self.project, "project")?,
            tag: text(self.tag, "tag")?,
            category,
            session_id,
        })
    }
}

/// Decodes raw rows, skipping (and logging) the ones that don't validate.
fn visit_rows(
    rows: impl Iterator<Item = rusqlite::Result<RawEvent>>,
    filter: Option<&EventFilter>,
    mut visit: impl FnMut(Event),
) -> Result<ScanStats, DbError> {
    let mut stats = ScanStats::default();
    for row in rows {
        let raw = row?;
        let id = raw.id;
        match raw.decode() {
            Ok(event) => {
                if filter.is_none_or(|f| f.matches_derived(&event)) {
                    stats.visited += 1;
                    visit(event);
                }
            }
            Err(reason) => {
                tracing::warn!(event_id = id, %reason, "skipping corrupt event row");
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

pub(crate) fn insert_event(
    conn: &Connection,
    event: NewEvent,
    session_id: Option<SessionId>,
) -> Result<Event, DbError> {
    event.validate()?;
    let event = NewEvent {
        started_at: storage_precision(event.started_at),
        ended_at: storage_precision(event.ended_at),
        ..event
    };

    conn.execute(
        "
        INSERT INTO events
        (command, started_at, ended_at, exit_code, cwd, project, tag, category, session_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
        params![
            event.command,
            format_timestamp(event.started_at),
            format_timestamp(event.ended_at),
            event.exit_code,
            event.cwd,
            event.project,
            event.tag,
            event.category.as_str(),
            session_id.map(SessionId::get),
        ],
    )?;
    let id = EventId::new(conn.last_insert_rowid())?;
    Ok(event.into_event(id, session_id))
}

impl Database {
    /// Appends an event attributed to `session_id`.
    ///
    /// Timestamps are stored with millisecond precision; the returned event
    /// carries exactly what was stored.
    pub fn append_event(
        &mut self,
        event: NewEvent,
        session_id: Option<SessionId>,
    ) -> Result<Event, DbError> {
        event.validate()?;
        let event = self.write(|tx| insert_event(tx, event, session_id))?;
        tracing::info!(event_id = %event.id, "event recorded");
        Ok(event)
    }

    /// Appends an event attributed to whichever session is open at commit
    /// time. The lookup and the insert share one locked transaction.
    pub fn append_event_in_current_session(&mut self, event: NewEvent) -> Result<Event, DbError> {
        event.validate()?;
        let event = self.write(|tx| {
            let session_id = crate::sessions::current_session_id_in(tx)?;
            insert_event(tx, event, session_id)
        })?;
        tracing::info!(event_id = %event.id, session_id = ?event.session_id.map(SessionId::get), "event recorded");
        Ok(event)
    }

    /// Streams matching events to `visit` in `(started_at, id)` order.
    ///
    /// The scan reads one snapshot; events appended while it runs are not
    /// visited. Rows that fail to decode are skipped and counted.
    pub fn scan_events(
        &self,
        filter: &EventFilter,
        visit: impl FnMut(Event),
    ) -> Result<ScanStats, DbError> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(from) = filter.from {
            clauses.push("started_at >= ?");
            values.push(Value::Text(format_timestamp(from)));
        }
        if let Some(to) = filter.to {
            clauses.push("started_at < ?");
            values.push(Value::Text(format_timestamp(to)));
        }
        if let Some(session_id) = filter.session_id {
            clauses.push("session_id = ?");
            values.push(Value::Integer(session_id.get()));
        }
        if let Some(tag) = &filter.tag {
            clauses.push("tag = ?");
            values.push(Value::Text(tag.clone()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events {where_clause} ORDER BY started_at ASC, id ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), RawEvent::from_row)?;
        let stats = visit_rows(rows, Some(filter), visit)?;
        tracing::debug!(visited = stats.visited, skipped = stats.skipped, "event scan finished");
        Ok(stats)
    }

    /// Collects matching events in chronological order.
    pub fn list_events(&self, filter: &EventFilter) -> Result<(Vec<Event>, ScanStats), DbError> {
        let mut events = Vec::new();
        let stats = self.scan_events(filter, |event| events.push(event))?;
        Ok((events, stats))
    }

    /// The most recent `limit` events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Result<(Vec<Event>, ScanStats), DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {EVENT_COLUMNS} FROM (
                SELECT {EVENT_COLUMNS} FROM events
                ORDER BY started_at DESC, id DESC
                LIMIT ?
            )
            ORDER BY started_at ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map([limit], RawEvent::from_row)?;
        let mut events = Vec::new();
        let stats = visit_rows(rows, None, |event| events.push(event))?;
        Ok((events, stats))
    }

    /// Number of stored event rows, including undecodable ones.
    pub fn count_events(&self) -> Result<u64, DbError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
