//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
///
/// These are raised before anything is written, so a validation failure
/// never leaves a partial record behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// An ID was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NonPositiveId { field: &'static str, value: i64 },

    /// A command finished before it started.
    #[error("invalid duration: ended at {ended_at} before it started at {started_at}")]
    InvalidDuration {
        started_at: String,
        ended_at: String,
    },

    /// A timestamp could not be understood.
    #[error("invalid timestamp {value:?}: expected RFC 3339 (2026-01-15T10:30:00Z), a local time (2026-01-15 10:30:00) or Unix seconds")]
    InvalidTimestamp { value: String },

    /// A timestamp falls outside the years the store can write.
    #[error("timestamp {value} is outside the supported years 0000-9999")]
    TimestampOutOfRange { value: String },

    /// An ignore rule regex failed to compile.
    #[error("invalid regex {pattern:?}: {message}")]
    InvalidRegex { pattern: String, message: String },

    /// Unknown ignore rule kind.
    #[error("invalid ignore rule kind: {value}")]
    InvalidRuleKind { value: String },

    /// Unknown report grouping.
    #[error("invalid grouping: {value} (expected project, tag, day, session, command or category)")]
    InvalidGroupBy { value: String },
}

/// Generates a validated integer ID newtype with common trait implementations.
macro_rules! define_int_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: i64) -> Result<Self, ValidationError> {
                if id <= 0 {
                    return Err(ValidationError::NonPositiveId {
                        field: $field_name,
                        value: id,
                    });
                }
                Ok(Self(id))
            }

            /// Returns the raw integer value.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_int_id!(
    /// A recorded event identifier.
    ///
    /// Assigned by the store, strictly increasing in insertion order.
    EventId, "event ID"
);

define_int_id!(
    /// A session identifier.
    ///
    /// Sequential per store; never reused because sessions are never deleted.
    SessionId, "session ID"
);

/// Trims a user-supplied label, rejecting blank input.
pub fn non_empty(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(trimmed.to_string())
}
