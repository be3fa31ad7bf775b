//! List command: show the most recent events.

use std::io::Write;

use anyhow::Result;
use chrono::{Local, TimeZone};
use tt_core::{Event, sanitize};
use tt_db::Database;

use crate::commands::util::format_duration;

const COMMAND_WIDTH: usize = 60;

pub fn run<W: Write>(writer: &mut W, db: &Database, limit: usize) -> Result<()> {
    let (events, stats) = db.recent_events(limit)?;

    if events.is_empty() {
        writeln!(writer, "No events recorded yet.")?;
    } else {
        writeln!(writer, "Recent events (showing {}):", events.len())?;
        for event in &events {
            writeln!(writer, "{}", format_event_line(event, &Local))?;
        }
    }

    if stats.skipped > 0 {
        writeln!(writer, "Note: {} unreadable event(s) skipped.", stats.skipped)?;
    }
    Ok(())
}

fn format_event_line<Tz: TimeZone>(event: &Event, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let status = match event.exit_code {
        Some(0) | None => "ok".to_string(),
        Some(code) => format!("fail({code})"),
    };
    let mut line = format!(
        "  #{:<5} {}  {:>10}  {:<9} {:<16} {:<9}",
        event.id.get(),
        event.started_at.with_timezone(tz).format("%Y-%m-%d %H:%M:%S"),
        format_duration(event.duration_ms()),
        status,
        sanitize::truncate(&event.project_key(), 16),
        event.category.as_str(),
    );
    if let Some(tag) = &event.tag {
        line.push_str(&format!(" [{tag}]"));
    }
    if let Some(session_id) = event.session_id {
        line.push_str(&format!(" (session {session_id})"));
    }
    line.push_str("  ");
    line.push_str(&sanitize::truncate(&event.command, COMMAND_WIDTH));
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};
    use tt_core::{NewEvent, categorize};

    fn new_event(command: &str, minute: u32, secs: i64, exit_code: Option<i32>) -> NewEvent {
        let started_at = Utc.with_ymd_and_hms(2026, 1, 28, 9, minute, 0).unwrap();
        NewEvent {
            command: command.to_string(),
            started_at,
            ended_at: started_at + Duration::seconds(secs),
            exit_code,
            cwd: Some("/home/dev/timetrace".to_string()),
            project: None,
            tag: None,
            category: categorize(command),
        }
    }

    #[test]
    fn empty_store() {
        let db = Database::open_in_memory().unwrap();
        let mut out = Vec::new();
        run(&mut out, &db, 10).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No events recorded yet.\n");
    }

    #[test]
    fn event_lines() {
        let mut db = Database::open_in_memory().unwrap();
        let session = db.start_session("sprint", Utc::now()).unwrap();
        db.append_event(new_event("cargo build --release", 0, 95, Some(0)), None)
            .unwrap();
        let mut failing = new_event("npm test", 5, 12, Some(1));
        failing.tag = Some("ci".to_string());
        db.append_event(failing, Some(session.id)).unwrap();

        let (events, _) = db.recent_events(10).unwrap();
        let lines: Vec<String> = events.iter().map(|e| format_event_line(e, &Utc)).collect();
        assert_eq!(
            lines[0],
            "  #1     2026-01-28 09:00:00      1m 35s  ok        timetrace        build      cargo build --release"
        );
        assert_eq!(
            lines[1],
            "  #2     2026-01-28 09:05:00         12s  fail(1)   timetrace        testing   [ci] (session 1)  npm test"
        );
    }

    #[test]
    fn limit_keeps_newest() {
        let mut db = Database::open_in_memory().unwrap();
        for minute in 0..5 {
            db.append_event(new_event("make", minute, 1, None), None).unwrap();
        }
        let mut out = Vec::new();
        run(&mut out, &db, 2).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert!(listing.starts_with("Recent events (showing 2):\n  #4 "));
        assert_eq!(listing.lines().count(), 3);
    }
}
