//! Session commands: start, stop, status and list.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use tt_core::Session;
use tt_db::Database;

use crate::commands::util::format_duration;

pub fn start<W: Write>(writer: &mut W, db: &mut Database, name: &str) -> Result<()> {
    let session = db.start_session(name, Utc::now())?;
    writeln!(writer, "Started session {session}")?;
    Ok(())
}

pub fn stop<W: Write>(writer: &mut W, db: &mut Database) -> Result<()> {
    let session = db.stop_session(Utc::now())?;
    let elapsed = session.elapsed(Utc::now()).num_milliseconds();
    writeln!(
        writer,
        "Stopped session {session} after {}",
        format_duration(elapsed)
    )?;
    Ok(())
}

pub fn status<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    match db.open_session()? {
        Some(session) => {
            let elapsed = session.elapsed(Utc::now()).num_milliseconds();
            writeln!(
                writer,
                "Active session: {session} (running {})",
                format_duration(elapsed)
            )?;
        }
        None => writeln!(writer, "No active session.")?,
    }
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, limit: usize) -> Result<()> {
    let sessions = db.list_sessions(Some(limit))?;
    if sessions.is_empty() {
        writeln!(writer, "No sessions yet.")?;
        return Ok(());
    }
    writeln!(writer, "Sessions (showing {}):", sessions.len())?;
    let now = Utc::now();
    for session in &sessions {
        writeln!(writer, "{}", format_session_line(session, now))?;
    }
    Ok(())
}

fn format_session_line(session: &Session, now: DateTime<Utc>) -> String {
    let started = session
        .started_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M");
    let ended = session.ended_at.map_or_else(
        || "running".to_string(),
        |ended| ended.with_timezone(&Local).format("%H:%M").to_string(),
    );
    format!(
        "  #{:<5} {:<24} {started} - {ended:<8} {:>11}",
        session.id.get(),
        session.name,
        format_duration(session.elapsed(now).num_milliseconds())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tt_core::SessionError;
    use tt_db::DbError;

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn start_status_stop() {
        let mut db = Database::open_in_memory().unwrap();

        assert_eq!(output(|w| status(w, &db)), "No active session.\n");
        assert_eq!(
            output(|w| start(w, &mut db, "deep work")),
            "Started session #1 deep work\n"
        );
        assert!(output(|w| status(w, &db)).starts_with("Active session: #1 deep work (running "));
        assert!(output(|w| stop(w, &mut db)).starts_with("Stopped session #1 deep work after "));
        assert_eq!(output(|w| status(w, &db)), "No active session.\n");
    }

    #[test]
    fn second_start_reports_conflict() {
        let mut db = Database::open_in_memory().unwrap();
        start(&mut Vec::new(), &mut db, "one").unwrap();

        let err = start(&mut Vec::new(), &mut db, "two").unwrap_err();
        assert_eq!(
            err.to_string(),
            "a session is already running (#1 one); stop it first"
        );
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::Session(SessionError::AlreadyActive { .. }))
        ));
    }

    #[test]
    fn stop_without_session_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let err = stop(&mut Vec::new(), &mut db).unwrap_err();
        assert_eq!(err.to_string(), "no active session");
    }

    #[test]
    fn list_shows_newest_first() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(output(|w| list(w, &db, 10)), "No sessions yet.\n");

        start(&mut Vec::new(), &mut db, "first").unwrap();
        stop(&mut Vec::new(), &mut db).unwrap();
        start(&mut Vec::new(), &mut db, "second").unwrap();

        let listing = output(|w| list(w, &db, 10));
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "Sessions (showing 2):");
        assert!(lines[1].starts_with("  #2     second"));
        assert!(lines[1].contains("running"));
        assert!(lines[2].starts_with("  #1     first"));
    }
}
