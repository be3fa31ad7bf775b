//! Core domain logic for the time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Events: recorded command executions and their derived durations
//! - Sessions: the Idle/Active state machine for named work sessions
//! - Ignore rules: the ordered filter applied before capture
//! - Categorization and sanitization of command text
//! - Reports: grouping and summing event durations
//!
//! Nothing in here touches the filesystem; persistence lives in `tt-db`.

pub mod category;
pub mod event;
pub mod ignore;
pub mod report;
pub mod sanitize;
pub mod session;
mod types;

pub use category::{Category, UnknownCategory, categorize};
pub use event::{Event, NewEvent};
pub use ignore::{DEFAULT_IGNORED_COMMANDS, IgnoreFilter, IgnoreRule, RuleKind, default_ignore_rules};
pub use report::{GroupBy, GroupTotal, Report, ReportBuilder, aggregate};
pub use session::{Session, SessionError, SessionState, StartError};
pub use types::{EventId, SessionId, ValidationError, non_empty};
