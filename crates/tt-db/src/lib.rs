//! Storage layer for TimeTrace.
//!
//! Persists the event log, the session table, and the ignore-rule list in a
//! single `SQLite` database using `rusqlite`.
//!
//! # Concurrency
//!
//! Independent CLI processes share one store. Every mutation acquires the
//! cross-process [`StoreLock`] (a file next to the database) and then runs in
//! an `IMMEDIATE` transaction, so read-check-write sequences such as
//! "start a session unless one is open" cannot interleave. Reads take no
//! lock: the database runs in WAL mode and each scan reads from a single
//! snapshot. A lock that cannot be acquired within the configured timeout,
//! or a `SQLITE_BUSY` surfacing from a read, is reported as
//! [`DbError::Busy`].
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. Use one `Database` per thread.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision and a `Z` suffix (e.g., `2026-01-15T10:30:00.000Z`), so
//! lexicographic ordering matches chronological ordering.
//!
//! Events are append-only: triggers abort any `UPDATE` or `DELETE` on the
//! `events` table, and sessions can be closed but never deleted. A partial
//! unique index allows at most one open session.

mod columns;
mod events;
mod ignore_rules;
mod lock;
mod sessions;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use thiserror::Error;

use tt_core::{SessionError, StartError, ValidationError, default_ignore_rules};

pub use events::{EventFilter, ScanStats};
pub use ignore_rules::{AddRuleOutcome, StoredRule};
pub use lock::{StoreLock, lock_path_for};

/// Current schema version, stored in the `meta` table.
pub const SCHEMA_VERSION: i64 = 1;

/// Default time to wait for the store lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),
    /// Another process holds the store; nothing was changed.
    #[error("store is busy ({detail}); try again")]
    Busy { detail: String },
    /// The lock file could not be opened or locked.
    #[error("failed to lock store at {path}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    /// A stored record could not be decoded.
    #[error("invalid {table} record {id}: {message}")]
    InvalidRecord {
        table: &'static str,
        id: i64,
        message: String,
    },
}

impl DbError {
    /// Whether the error is transient and the operation can be retried.
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy {
                detail: err.to_string(),
            },
            _ => Self::Sqlite(err),
        }
    }
}

impl From<StartError> for DbError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::Validation(err) => Self::Validation(err),
            StartError::Session(err) => Self::Session(err),
        }
    }
}

/// Options applied when opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long mutations wait for the store lock (and reads for `SQLite`).
    pub lock_timeout: Duration,
    /// Seed [`default_ignore_rules`] when the store is first created.
    pub seed_default_ignores: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            seed_default_ignores: true,
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for concurrency considerations.
pub struct Database {
    conn: Connection,
    lock_path: Option<PathBuf>,
    lock_timeout: Duration,
}

impl Database {
    /// Opens a database at the given path with default options, creating it
    /// if necessary.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with(path, &StoreOptions::default())
    }

    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized (under the store lock) on first open.
    pub fn open_with(path: &Path, options: &StoreOptions) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.lock_timeout)?;
        let mut db = Self {
            conn,
            lock_path: Some(lock_path_for(path)),
            lock_timeout: options.lock_timeout,
        };
        db.init(options.seed_default_ignores)?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. No lock file is used and the database is destroyed
    /// when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::open_in_memory_with(&StoreOptions::default())
    }

    pub fn open_in_memory_with(options: &StoreOptions) -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self {
            conn,
            lock_path: None,
            lock_timeout: options.lock_timeout,
        };
        db.init(options.seed_default_ignores)?;
        Ok(db)
    }

    /// Initializes the schema and seeds default ignore rules once.
    ///
    /// This is idempotent and skips the lock entirely when the schema is
    /// already current, so read-only commands don't contend with writers.
    fn init(&mut self, seed_default_ignores: bool) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if self.schema_version()? == Some(SCHEMA_VERSION) {
            return Ok(());
        }

        let _lock = self.lock()?;
        let mode: String =
            self.conn
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "initializing store schema");

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT
            );

            -- At most one open session across the whole store
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_single_open
                ON sessions ((ended_at IS NULL)) WHERE ended_at IS NULL;

            CREATE TRIGGER IF NOT EXISTS sessions_never_deleted
            BEFORE DELETE ON sessions
            BEGIN
                SELECT RAISE(ABORT, 'sessions are never deleted');
            END;

            CREATE TRIGGER IF NOT EXISTS sessions_close_once
            BEFORE UPDATE ON sessions
            WHEN OLD.ended_at IS NOT NULL
            BEGIN
                SELECT RAISE(ABORT, 'closed sessions are immutable');
            END;

            -- Events table: one row per recorded command execution
            -- started_at/ended_at: RFC 3339 UTC with milliseconds
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                command TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                exit_code INTEGER,
                cwd TEXT,
                project TEXT,
                tag TEXT,
                category TEXT NOT NULL DEFAULT 'other',
                session_id INTEGER,
                FOREIGN KEY (session_id) REFERENCES sessions(id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_started ON events(started_at);
            CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
            CREATE INDEX IF NOT EXISTS idx_events_tag ON events(tag);
            CREATE INDEX IF NOT EXISTS idx_events_category ON events(category);

            CREATE TRIGGER IF NOT EXISTS events_append_only_update
            BEFORE UPDATE ON events
            BEGIN
                SELECT RAISE(ABORT, 'events are append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS events_append_only_delete
            BEFORE DELETE ON events
            BEGIN
                SELECT RAISE(ABORT, 'events are append-only');
            END;

            -- Ignore rules, evaluated in id order
            CREATE TABLE IF NOT EXISTS ignore_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                pattern TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )?;

        let seeded: Option<String> = tx
            .query_row(
                "SELECT value FROM meta WHERE key = 'ignore_defaults_seeded'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if seeded.is_none() {
            if seed_default_ignores {
                let now = format_timestamp(Utc::now());
                let mut stmt = tx.prepare(
                    "INSERT INTO ignore_rules (kind, pattern, created_at) VALUES (?, ?, ?)",
                )?;
                for rule in default_ignore_rules() {
                    stmt.execute((rule.kind().as_str(), rule.pattern(), &now))?;
                }
            }
            tx.execute(
                "INSERT INTO meta (key, value) VALUES ('ignore_defaults_seeded', ?)",
                [if seed_default_ignores { "1" } else { "0" }],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
            [SCHEMA_VERSION.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Reads the stored schema version, if the schema exists.
    fn schema_version(&self) -> Result<Option<i64>, DbError> {
        let has_meta: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'meta')",
            [],
            |row| row.get(0),
        )?;
        if !has_meta {
            return Ok(None);
        }
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Acquires the store lock. In-memory databases have no lock.
    fn lock(&self) -> Result<Option<StoreLock>, DbError> {
        self.lock_path
            .as_deref()
            .map(|path| StoreLock::acquire(path, self.lock_timeout))
            .transpose()
    }

    /// Runs `f` in an `IMMEDIATE` transaction while holding the store lock.
    ///
    /// Either everything `f` wrote is committed or nothing is: an error
    /// rolls the transaction back, and the lock is released on every path.
    fn write<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let _lock = self.lock()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Formats a timestamp for storage.
pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drops sub-millisecond precision so stored and returned values agree.
pub(crate) fn storage_precision(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(3)
}

pub(crate) fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("invalid timestamp {timestamp:?}: {err}"))
}
