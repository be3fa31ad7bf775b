//! Report command for summarizing recorded time.
//!
//! This module implements `timetrace report` with window options
//! (--today, --yesterday, --last N), filters, a grouping key, and output
//! formats (human-readable, JSON).

use std::fmt::Write;

use anyhow::Result;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;
use tt_core::{GroupBy, GroupTotal, Report, ReportBuilder, sanitize};
use tt_db::{Database, EventFilter};

use crate::commands::util::{Window, format_duration};

/// Widest group key shown before truncation.
const MAX_KEY_WIDTH: usize = 32;

/// Computed report data.
#[derive(Debug)]
pub struct ReportData {
    pub generated_at: DateTime<Utc>,
    pub window: Window,
    pub filter: EventFilter,
    pub timezone: String,
    pub report: Report,
    /// Stored rows left out because they could not be read.
    pub skipped: usize,
}

// ========== Report Generation ==========

/// Aggregates matching events from the database, bucketing days in local time.
pub fn generate_report_data(
    db: &Database,
    window: Window,
    filter: EventFilter,
    group_by: GroupBy,
    generated_at: DateTime<Utc>,
) -> Result<ReportData> {
    let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());

    let mut builder = ReportBuilder::new(group_by, Local);
    let stats = db.scan_events(&filter, |event| builder.push(&event))?;
    if stats.skipped > 0 {
        tracing::warn!(skipped = stats.skipped, "report excludes unreadable events");
    }

    Ok(ReportData {
        generated_at,
        window,
        filter,
        timezone,
        report: builder.finish(),
        skipped: stats.skipped,
    })
}

// ========== Progress Bar ==========

/// Generates a 10-cell bar scaled to `max`.
/// Any non-zero value gets at least one block.
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░".repeat(10);
    }
    let value = value.clamp(0, max);
    let mut filled = usize::try_from((value * 10 + max / 2) / max).unwrap_or(0);
    if value > 0 && filled == 0 {
        filled = 1;
    }
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn count_label(group: &GroupTotal) -> String {
    let runs = if group.count == 1 {
        "1 run".to_string()
    } else {
        format!("{} runs", group.count)
    };
    if group.failed_count > 0 {
        format!("{runs}, {} failed", group.failed_count)
    } else {
        runs
    }
}

/// Describes the active filters for the header line.
fn filter_description(filter: &EventFilter) -> String {
    let mut parts = Vec::new();
    if let Some(session_id) = filter.session_id {
        parts.push(format!("session {session_id}"));
    }
    if let Some(project) = &filter.project {
        parts.push(format!("project {project}"));
    }
    if let Some(tag) = &filter.tag {
        parts.push(format!("tag {tag}"));
    }
    if let Some(category) = filter.category {
        parts.push(format!("category {category}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("  ({})", parts.join(", "))
    }
}

// ========== Text Output ==========

/// Formats the human-readable report output.
pub fn format_report(data: &ReportData) -> String {
    let mut output = String::new();
    let report = &data.report;

    let _ = writeln!(
        output,
        "TimeTrace: {}{}",
        data.window.label,
        filter_description(&data.filter)
    );

    if report.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No events recorded in this window.");
    } else {
        let ranked = report.ranked();
        let keys: Vec<String> = ranked
            .iter()
            .map(|g| sanitize::truncate(&g.key, MAX_KEY_WIDTH))
            .collect();
        let width = keys.iter().map(|k| k.chars().count()).max().unwrap_or(0);
        let max = report.max_group_ms();

        let _ = writeln!(output);
        let _ = writeln!(output, "By {}:", report.group_by);
        for (group, key) in ranked.iter().zip(&keys) {
            let _ = writeln!(
                output,
                "  {key:<width$}  {:>10}  {}  {}",
                format_duration(group.duration_ms),
                progress_bar(group.duration_ms, max),
                count_label(group)
            );
        }

        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Total:   {} ({} runs)",
            format_duration(report.total_ms),
            report.count
        );
        let _ = writeln!(output, "Failed:  {}", format_duration(report.failed_ms));
    }

    if data.skipped > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Note: {} unreadable event(s) skipped.",
            data.skipped
        );
    }

    output
}

// ========== JSON Output ==========

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub timezone: String,
    pub window: JsonWindow,
    pub group_by: GroupBy,
    /// Display order: longest first.
    pub groups: Vec<&'a GroupTotal>,
    pub totals: JsonTotals,
    pub skipped: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonWindow {
    pub label: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JsonTotals {
    pub duration_ms: i64,
    pub failed_ms: i64,
    pub count: usize,
}

fn rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats report data as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let report = JsonReport {
        generated_at: rfc3339(data.generated_at),
        timezone: data.timezone.clone(),
        window: JsonWindow {
            label: data.window.label.clone(),
            start: data.window.from.map(rfc3339),
            end: data.window.to.map(rfc3339),
        },
        group_by: data.report.group_by,
        groups: data.report.ranked(),
        totals: JsonTotals {
            duration_ms: data.report.total_ms,
            failed_ms: data.report.failed_ms,
            count: data.report.count,
        },
        skipped: data.skipped,
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

// ========== Public Interface ==========

/// Runs the report command.
pub fn run<W: std::io::Write>(
    writer: &mut W,
    db: &Database,
    window: Window,
    filter: EventFilter,
    group_by: GroupBy,
    json: bool,
) -> Result<()> {
    let data = generate_report_data(db, window, filter, group_by, Utc::now())?;

    if json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }

    Ok(())
}
