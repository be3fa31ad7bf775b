//! Named work sessions and the Idle/Active state machine.
//!
//! The CLI runs as a fresh process per command, so there is no resident
//! session object. Each invocation rebuilds a [`SessionState`] from the
//! store's open session (if any) and asks it whether a transition is allowed.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{SessionId, ValidationError, non_empty};

/// A named, time-bounded grouping of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub started_at: DateTime<Utc>,
    /// `None` while the session is open.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub const fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Elapsed time, measured up to `now` for an open session.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.ended_at.unwrap_or(now) - self.started_at
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.name)
    }
}

/// Rejected session transitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session is already running ({session}); stop it first")]
    AlreadyActive { session: Box<Session> },

    #[error("no active session")]
    NoActiveSession,
}

/// Current session state, rebuilt from persisted fields on every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Active(Session),
}

impl SessionState {
    /// Builds the state from the store's open session.
    /// A session that has already ended counts as idle.
    pub fn from_open(open: Option<Session>) -> Self {
        open.filter(Session::is_open).map_or(Self::Idle, Self::Active)
    }

    /// The open session, if any. Never transitions.
    pub const fn current(&self) -> Option<&Session> {
        match self {
            Self::Idle => None,
            Self::Active(session) => Some(session),
        }
    }

    /// Validates `start(name)` and returns the trimmed name to persist.
    ///
    /// An open session is never stopped implicitly.
    pub fn start(&self, name: &str) -> Result<String, StartError> {
        if let Self::Active(session) = self {
            return Err(StartError::Session(SessionError::AlreadyActive {
                session: Box::new(session.clone()),
            }));
        }
        Ok(non_empty(name, "session name")?)
    }

    /// Validates `stop()` and returns the session to close.
    pub fn stop(self) -> Result<Session, SessionError> {
        match self {
            Self::Idle => Err(SessionError::NoActiveSession),
            Self::Active(session) => Ok(session),
        }
    }
}

/// Reasons `start` can be refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
