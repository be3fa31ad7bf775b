//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use tt_core::{SessionId, ValidationError};
use tt_db::EventFilter;

use crate::cli::{FilterArgs, WindowArgs};

/// Naive formats accepted by `record`, read as local time.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a timestamp from a shell hook or user.
///
/// Accepts:
/// - RFC 3339: "2026-01-15T10:30:00Z", "2026-01-15T10:30:00.1234567+01:00"
/// - Local date-time without offset: "2026-01-15 10:30:00"
/// - Unix seconds with optional fraction: "1768473000.123456"
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    parse_timestamp_in(s, &Local)
}

fn parse_timestamp_in<Tz: TimeZone>(s: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Some(dt) = parse_unix_seconds(s) {
        return Ok(dt);
    }

    let invalid = || ValidationError::InvalidTimestamp {
        value: s.to_string(),
    };
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            // Times skipped by a DST jump don't exist locally
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| invalid().into());
        }
    }

    Err(invalid().into())
}

/// `$EPOCHREALTIME` uses the locale's decimal separator, so accept both.
fn parse_unix_seconds(s: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = s.split_once(['.', ',']).unwrap_or((s, ""));
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = format!("{frac:0<9}").get(..9)?.parse().ok()?;
    DateTime::from_timestamp(secs, nanos)
}

// ========== Windows ==========

/// A reporting window in UTC, half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Human description, e.g. "Jan 28, 2026 (today)".
    pub label: String,
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
pub fn midnight_to_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Midnight skipped by a DST jump: the day starts at the first valid hour
        LocalResult::None => (1..=3)
            .filter_map(|hour| tz.from_local_datetime(&(midnight + Duration::hours(hour))).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .next()
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// Resolves window flags against `today` in `tz`.
///
/// Without flags the window is today, unless a session filter is given, in
/// which case the whole history of that session is searched.
pub fn resolve_window<Tz: TimeZone>(
    args: &WindowArgs,
    has_session_filter: bool,
    today: NaiveDate,
    tz: &Tz,
) -> Window {
    let day = |date: NaiveDate, suffix: &str| Window {
        from: Some(midnight_to_utc(tz, date)),
        to: Some(midnight_to_utc(tz, date + Duration::days(1))),
        label: format!("{} ({suffix})", date.format("%b %-d, %Y")),
    };

    if args.yesterday {
        day(today - Duration::days(1), "yesterday")
    } else if let Some(days) = args.last {
        let first = today - Duration::days(i64::from(days.max(1)) - 1);
        Window {
            from: Some(midnight_to_utc(tz, first)),
            to: Some(midnight_to_utc(tz, today + Duration::days(1))),
            label: if days == 1 {
                "last 1 day".to_string()
            } else {
                format!("last {days} days")
            },
        }
    } else if args.today || !has_session_filter {
        day(today, "today")
    } else {
        Window {
            from: None,
            to: None,
            label: "all time".to_string(),
        }
    }
}

/// Builds the store filter for a window and the shared filter flags.
pub fn event_filter(window: &Window, filters: &FilterArgs) -> Result<EventFilter> {
    let session_id = filters
        .session
        .map(SessionId::new)
        .transpose()
        .context("invalid --session")?;
    Ok(EventFilter {
        from: window.from,
        to: window.to,
        session_id,
        project: filters.project.clone(),
        tag: filters.tag.clone(),
        category: filters.category.map(Into::into),
    })
}

// ========== Duration Formatting ==========

/// Formats milliseconds as a rounded duration.
/// Returns "Xh MMm SSs", "Xm SSs" or "Xs". Negative durations show as 0s.
pub fn format_duration(ms: i64) -> String {
    let total = (ms.max(0) + 500) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(
            parse_timestamp("2026-01-15T10:30:00+02:00").unwrap(),
            utc("2026-01-15T08:30:00Z")
        );
        assert_eq!(
            parse_timestamp("2026-01-15T10:30:00.1234567Z").unwrap(),
            utc("2026-01-15T10:30:00.1234567Z")
        );
    }

    #[test]
    fn test_parse_naive_uses_given_zone() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            parse_timestamp_in("2026-01-15 10:30:00", &plus_two).unwrap(),
            utc("2026-01-15T08:30:00Z")
        );
        assert_eq!(
            parse_timestamp_in("2026-01-15T10:30", &plus_two).unwrap(),
            utc("2026-01-15T08:30:00Z")
        );
    }

    #[test]
    fn test_parse_unix_seconds() {
        assert_eq!(
            parse_timestamp("1768473000.25").unwrap(),
            utc("2026-01-15T10:30:00.25Z")
        );
        assert_eq!(
            parse_timestamp("1768473000,5").unwrap(),
            utc("2026-01-15T10:30:00.5Z")
        );
        assert_eq!(parse_timestamp("1768473000").unwrap(), utc("2026-01-15T10:30:00Z"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(err.is::<ValidationError>());
        assert!(parse_timestamp("12ab").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_today_window() {
        let window = resolve_window(&WindowArgs::default(), false, date(2026, 1, 28), &Utc);
        assert_eq!(window.from, Some(utc("2026-01-28T00:00:00Z")));
        assert_eq!(window.to, Some(utc("2026-01-29T00:00:00Z")));
        assert_eq!(window.label, "Jan 28, 2026 (today)");
    }

    #[test]
    fn test_yesterday_window_in_offset_zone() {
        let args = WindowArgs {
            yesterday: true,
            ..WindowArgs::default()
        };
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let window = resolve_window(&args, false, date(2026, 3, 1), &tokyo);
        assert_eq!(window.from, Some(utc("2026-02-27T15:00:00Z")));
        assert_eq!(window.to, Some(utc("2026-02-28T15:00:00Z")));
        assert_eq!(window.label, "Feb 28, 2026 (yesterday)");
    }

    #[test]
    fn test_last_n_days_includes_today() {
        let args = WindowArgs {
            last: Some(7),
            ..WindowArgs::default()
        };
        let window = resolve_window(&args, false, date(2026, 1, 28), &Utc);
        assert_eq!(window.from, Some(utc("2026-01-22T00:00:00Z")));
        assert_eq!(window.to, Some(utc("2026-01-29T00:00:00Z")));
        assert_eq!(window.label, "last 7 days");
    }

    #[test]
    fn test_session_filter_without_flags_is_unbounded() {
        let window = resolve_window(&WindowArgs::default(), true, date(2026, 1, 28), &Utc);
        assert_eq!(window.from, None);
        assert_eq!(window.to, None);

        let args = WindowArgs {
            today: true,
            ..WindowArgs::default()
        };
        let window = resolve_window(&args, true, date(2026, 1, 28), &Utc);
        assert!(window.from.is_some());
    }

    #[test]
    fn test_event_filter_rejects_bad_session() {
        let window = resolve_window(&WindowArgs::default(), true, date(2026, 1, 28), &Utc);
        let filters = FilterArgs {
            session: Some(0),
            ..FilterArgs::default()
        };
        assert!(event_filter(&window, &filters).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(3_400), "3s");
        assert_eq!(format_duration(3_600), "4s");
        assert_eq!(format_duration(125_000), "2m 05s");
        assert_eq!(format_duration(3_723_000), "1h 02m 03s");
        assert_eq!(format_duration(-5_000), "0s");
    }
}
