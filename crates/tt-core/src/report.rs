//! Report aggregation over recorded events.
//!
//! The aggregator is a single pass: events are pushed one at a time and
//! durations are summed per group key in first-seen order. Display ordering
//! is derived afterwards by [`Report::ranked`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::types::ValidationError;

/// Group key for events without a tag.
pub const UNTAGGED: &str = "(untagged)";
/// Group key for events captured outside a session.
pub const NO_SESSION: &str = "(no session)";

/// Which field events are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Project,
    Tag,
    Day,
    Session,
    Command,
    Category,
}

impl GroupBy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Tag => "tag",
            Self::Day => "day",
            Self::Session => "session",
            Self::Command => "command",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "tag" => Ok(Self::Tag),
            "day" => Ok(Self::Day),
            "session" => Ok(Self::Session),
            "command" => Ok(Self::Command),
            "category" => Ok(Self::Category),
            _ => Err(ValidationError::InvalidGroupBy {
                value: s.to_string(),
            }),
        }
    }
}

/// Summed time for one group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub duration_ms: i64,
    pub count: usize,
    pub failed_count: usize,
}

/// Aggregated durations for a query window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub group_by: GroupBy,
    /// Groups in first-seen order.
    pub groups: Vec<GroupTotal>,
    pub total_ms: i64,
    pub failed_ms: i64,
    pub count: usize,
}

impl Report {
    pub fn empty(group_by: GroupBy) -> Self {
        Self {
            group_by,
            groups: Vec::new(),
            total_ms: 0,
            failed_ms: 0,
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn group(&self, key: &str) -> Option<&GroupTotal> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Groups ordered for display: longest total first, ties by key.
    pub fn ranked(&self) -> Vec<&GroupTotal> {
        let mut ranked: Vec<&GroupTotal> = self.groups.iter().collect();
        ranked.sort_by(|a, b| {
            b.duration_ms
                .cmp(&a.duration_ms)
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked
    }

    /// Largest group total, used to scale bar charts.
    pub fn max_group_ms(&self) -> i64 {
        self.groups.iter().map(|g| g.duration_ms).max().unwrap_or(0)
    }
}

/// Streaming aggregator.
///
/// `tz` decides which calendar day an event belongs to when grouping by day.
#[derive(Debug)]
pub struct ReportBuilder<Tz: TimeZone> {
    report: Report,
    index: HashMap<String, usize>,
    tz: Tz,
}

impl<Tz: TimeZone> ReportBuilder<Tz> {
    pub fn new(group_by: GroupBy, tz: Tz) -> Self {
        Self {
            report: Report::empty(group_by),
            index: HashMap::new(),
            tz,
        }
    }

    pub fn push(&mut self, event: &Event) {
        let duration_ms = event.duration_ms();
        let failed = event.failed();
        let key = self.key_for(event);

        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.report.groups.len();
                self.report.groups.push(GroupTotal {
                    key: key.clone(),
                    duration_ms: 0,
                    count: 0,
                    failed_count: 0,
                });
                self.index.insert(key, slot);
                slot
            }
        };

        let group = &mut self.report.groups[slot];
        group.duration_ms += duration_ms;
        group.count += 1;
        if failed {
            group.failed_count += 1;
            self.report.failed_ms += duration_ms;
        }
        self.report.total_ms += duration_ms;
        self.report.count += 1;
    }

    pub fn finish(self) -> Report {
        self.report
    }

    fn key_for(&self, event: &Event) -> String {
        match self.report.group_by {
            GroupBy::Project => event.project_key(),
            GroupBy::Tag => event
                .tag
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTAGGED.to_string()),
            GroupBy::Day => local_day(&self.tz, event).format("%Y-%m-%d").to_string(),
            GroupBy::Session => event
                .session_id
                .map_or_else(|| NO_SESSION.to_string(), |id| id.to_string()),
            GroupBy::Command => event.command.clone(),
            GroupBy::Category => event.category.to_string(),
        }
    }
}

/// Aggregates a finite sequence of events.
pub fn aggregate<'a, Tz: TimeZone>(
    events: impl IntoIterator<Item = &'a Event>,
    group_by: GroupBy,
    tz: Tz,
) -> Report {
    let mut builder = ReportBuilder::new(group_by, tz);
    for event in events {
        builder.push(event);
    }
    builder.finish()
}

fn local_day<Tz: TimeZone>(tz: &Tz, event: &Event) -> NaiveDate {
    event.started_at.with_timezone(tz).date_naive()
}
