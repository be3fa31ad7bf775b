//! Session table operations.
//!
//! Every transition rebuilds a [`SessionState`] from the table inside the
//! write transaction, so the check and the write see the same data.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};

use tt_core::{Session, SessionId, SessionState, ValidationError};

use crate::columns::{owned, text};
use crate::{Database, DbError, format_timestamp, parse_timestamp, storage_precision};

const SESSION_COLUMNS: &str = "id, name, started_at, ended_at";

/// Row as stored, before any type checks.
struct RawSession {
    id: i64,
    name: Value,
    started_at: Value,
    ended_at: Value,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: owned(row.get_ref(1)?),
            started_at: owned(row.get_ref(2)?),
            ended_at: owned(row.get_ref(3)?),
        })
    }

    fn decode(self) -> Result<Session, String> {
        let started_at = text(self.started_at, "started_at")?.ok_or("missing started_at")?;
        Ok(Session {
            id: SessionId::new(self.id).map_err(|err| err.to_string())?,
            name: text(self.name, "name")?.ok_or("missing name")?,
            started_at: parse_timestamp(&started_at)?,
            ended_at: text(self.ended_at, "ended_at")?
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }

    fn decode_or_invalid(self) -> Result<Session, DbError> {
        let id = self.id;
        self.decode().map_err(|message| DbError::InvalidRecord {
            table: "sessions",
            id,
            message,
        })
    }
}

fn open_row_in(conn: &Connection) -> Result<Option<RawSession>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE ended_at IS NULL"),
            [],
            RawSession::from_row,
        )
        .optional()?)
}

/// The open session. An undecodable open row is an error, since it still
/// holds the single-open-session slot.
pub(crate) fn open_session_in(conn: &Connection) -> Result<Option<Session>, DbError> {
    open_row_in(conn)?.map(RawSession::decode_or_invalid).transpose()
}

/// The open session's ID for attributing a new event.
///
/// An undecodable open row is logged and treated as no session, so commands
/// keep being recorded.
pub(crate) fn current_session_id_in(conn: &Connection) -> Result<Option<SessionId>, DbError> {
    let Some(raw) = open_row_in(conn)? else {
        return Ok(None);
    };
    let id = raw.id;
    match raw.decode() {
        Ok(session) => Ok(Some(session.id)),
        Err(reason) => {
            tracing::warn!(session_id = id, %reason, "ignoring corrupt open session row");
            Ok(None)
        }
    }
}

impl Database {
    /// The currently open session, if any.
    pub fn open_session(&self) -> Result<Option<Session>, DbError> {
        open_session_in(&self.conn)
    }

    pub fn session_state(&self) -> Result<SessionState, DbError> {
        Ok(SessionState::from_open(self.open_session()?))
    }

    /// Opens a new session named `name` starting at `at`.
    ///
    /// Fails with [`tt_core::SessionError::AlreadyActive`] if one is already
    /// open; the open session is left untouched.
    pub fn start_session(&mut self, name: &str, at: DateTime<Utc>) -> Result<Session, DbError> {
        let started_at = storage_precision(at);
        let session = self.write(|tx| {
            let name = SessionState::from_open(open_session_in(tx)?).start(name)?;
            tx.execute(
                "INSERT INTO sessions (name, started_at) VALUES (?, ?)",
                (&name, format_timestamp(started_at)),
            )?;
            Ok(Session {
                id: SessionId::new(tx.last_insert_rowid())?,
                name,
                started_at,
                ended_at: None,
            })
        })?;
        tracing::info!(session = %session, "session started");
        Ok(session)
    }

    /// Closes the open session at `at`.
    pub fn stop_session(&mut self, at: DateTime<Utc>) -> Result<Session, DbError> {
        let ended_at = storage_precision(at);
        let session = self.write(|tx| {
            let open = SessionState::from_open(open_session_in(tx)?).stop()?;
            if ended_at < open.started_at {
                return Err(ValidationError::InvalidDuration {
                    started_at: format_timestamp(open.started_at),
                    ended_at: format_timestamp(ended_at),
                }
                .into());
            }
            tx.execute(
                "UPDATE sessions SET ended_at = ? WHERE id = ?",
                (format_timestamp(ended_at), open.id.get()),
            )?;
            Ok(Session {
                ended_at: Some(ended_at),
                ..open
            })
        })?;
        tracing::info!(session = %session, "session stopped");
        Ok(session)
    }

    pub fn get_session(&self, id: SessionId) -> Result<Option<Session>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"),
                [id.get()],
                RawSession::from_row,
            )
            .optional()?
            .map(RawSession::decode_or_invalid)
            .transpose()
    }

    /// Sessions, newest first. Rows that fail to decode are logged and left out.
    pub fn list_sessions(&self, limit: Option<usize>) -> Result<Vec<Session>, DbError> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY id DESC LIMIT ?"
        ))?;
        let rows = stmt.query_map([limit], RawSession::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            let raw = row?;
            let id = raw.id;
            match raw.decode() {
                Ok(session) => sessions.push(session),
                Err(reason) => tracing::warn!(session_id = id, %reason, "skipping corrupt session row"),
            }
        }
        Ok(sessions)
    }
}
