//! End-to-end tests driving the `timetrace` binary against a temporary store.
//!
//! Every test pins `TZ=UTC` so local-day windows line up with the UTC
//! timestamps passed to `record`.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tempfile::TempDir;

struct Env {
    temp: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn db_path(&self) -> PathBuf {
        self.temp.path().join("data").join("timetrace.db")
    }

    fn command(&self) -> Command {
        command_for(self.temp.path(), &self.db_path())
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("failed to run timetrace")
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "timetrace {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn record(&self, command: &str, started: &str, finished: &str) -> Output {
        self.run(&[
            "record",
            "--started",
            started,
            "--finished",
            finished,
            "--command",
            command,
            "--cwd",
            "/home/dev/timetrace",
            "--exit",
            "0",
        ])
    }

    fn event_count(&self) -> i64 {
        let conn = rusqlite::Connection::open(self.db_path()).unwrap();
        conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap()
    }

    fn report_json(&self, args: &[&str]) -> Value {
        let mut full = vec!["report", "--json"];
        full.extend_from_slice(args);
        serde_json::from_str(&self.stdout(&full)).unwrap()
    }
}

fn command_for(home: &Path, db: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_timetrace"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("share"))
        .env("TZ", "UTC")
        .env_remove("TIMETRACE_PROJECT")
        .env_remove("TIMETRACE_TAG")
        .env_remove("TIMETRACE_LOG")
        .env_remove("TIMETRACE_DATABASE_PATH")
        .arg("--db")
        .arg(db);
    cmd
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn at(time: &str) -> String {
    format!("{}T{time}Z", today())
}

#[test]
fn test_run_record_report_flow() {
    let env = Env::new();

    let output = env.run(&["run", "--project", "demo", "--", "echo", "hello"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Saved event #1  project=demo"), "{stderr}");

    let output = env.run(&[
        "record",
        "--started",
        &at("09:00:00"),
        "--finished",
        &at("09:01:00"),
        "--command",
        "cargo build",
        "--project",
        "demo",
        "--exit",
        "0",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Saved event #2\n");

    let report = env.report_json(&["--today"]);
    assert_eq!(report["totals"]["count"], 2);
    assert_eq!(report["groups"][0]["key"], "demo");
    assert_eq!(report["groups"][0]["count"], 2);
    assert_eq!(report["skipped"], 0);
}

#[test]
fn test_concurrent_runs_record_every_event() {
    let env = Env::new();
    // Create the store up front so the runs only race on appends
    env.stdout(&["session", "status"]);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let mut cmd = env.command();
            cmd.env("TIMETRACE_LOCK_TIMEOUT_MS", "20000")
                .args(["run", "--project", "demo", "--", "echo"])
                .arg(i.to_string());
            thread::spawn(move || cmd.output().unwrap())
        })
        .collect();

    for handle in handles {
        let output = handle.join().unwrap();
        assert!(
            output.status.success(),
            "run failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    assert_eq!(env.event_count(), 8);
}

#[test]
fn test_report_survives_corrupt_rows() {
    let env = Env::new();
    assert!(env.record("make", &at("10:00:00"), &at("10:00:05")).status.success());

    let conn = rusqlite::Connection::open(env.db_path()).unwrap();
    conn.execute(
        "INSERT INTO events (command, started_at, ended_at) VALUES ('broken', ?1, 'not a time')",
        [format!("{}Tgarbage", today())],
    )
    .unwrap();
    drop(conn);

    let text = env.stdout(&["report", "--today"]);
    assert!(text.contains("Total:   5s (1 runs)"), "{text}");
    assert!(text.contains("Note: 1 unreadable event(s) skipped."), "{text}");

    let report = env.report_json(&["--today"]);
    assert_eq!(report["totals"]["count"], 1);
    assert_eq!(report["skipped"], 1);
}

#[test]
fn test_second_session_start_is_a_conflict() {
    let env = Env::new();
    assert_eq!(env.stdout(&["session", "start", "deep work"]), "Started session #1 deep work\n");

    let output = env.run(&["session", "start", "other"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already running"), "{stderr}");

    assert!(env.stdout(&["session", "stop"]).starts_with("Stopped session #1 deep work"));
    assert_eq!(env.run(&["session", "stop"]).status.code(), Some(3));
}

#[test]
fn test_events_join_the_open_session() {
    let env = Env::new();
    env.stdout(&["session", "start", "sprint"]);
    assert!(env.record("make", &at("10:00:00"), &at("10:00:05")).status.success());
    env.stdout(&["session", "stop"]);
    assert!(env.record("make", &at("11:00:00"), &at("11:00:05")).status.success());

    let report = env.report_json(&["--session", "1"]);
    assert_eq!(report["window"]["label"], "all time");
    assert_eq!(report["totals"]["count"], 1);
    assert_eq!(report["totals"]["duration_ms"], 5000);
}

#[test]
fn test_ignored_commands_are_not_recorded() {
    let env = Env::new();
    assert!(env.record("make", &at("10:00:00"), &at("10:00:01")).status.success());
    assert_eq!(env.event_count(), 1);

    let output = env.record("ls -la", &at("10:01:00"), &at("10:01:01"));
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert_eq!(env.event_count(), 1);

    assert!(env.record("lsof -i :8080", &at("10:01:30"), &at("10:01:31")).status.success());
    assert_eq!(env.event_count(), 2);

    env.stdout(&["ignore", "add-exact", "make"]);
    assert!(env.record("make", &at("10:02:00"), &at("10:02:01")).status.success());
    assert_eq!(env.event_count(), 2);

    env.stdout(&["ignore", "remove-exact", "make"]);
    assert!(env.record("make", &at("10:03:00"), &at("10:03:01")).status.success());
    assert_eq!(env.event_count(), 3);
}

#[test]
fn test_day_report_has_one_bucket() {
    let env = Env::new();
    for (start, end) in [
        ("09:00:00", "09:01:00"),
        ("14:00:00", "14:02:00"),
        ("23:30:00", "23:30:30"),
    ] {
        assert!(env.record("make", &at(start), &at(end)).status.success());
    }

    let report = env.report_json(&["--today", "--by", "day"]);
    let groups = report["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["key"], today().format("%Y-%m-%d").to_string());
    assert_eq!(groups[0]["duration_ms"], 210_000);
    assert_eq!(report["totals"]["duration_ms"], 210_000);
}

#[test]
fn test_report_is_repeatable() {
    let env = Env::new();
    assert!(env.record("cargo test", &at("08:00:00"), &at("08:00:42")).status.success());
    assert!(env.record("git push", &at("08:05:00"), &at("08:05:03")).status.success());

    let first = env.stdout(&["report", "--today", "--by", "category"]);
    let second = env.stdout(&["report", "--today", "--by", "category"]);
    assert_eq!(first, second);
    assert!(first.contains("By category:"), "{first}");
}

#[test]
fn test_invalid_input_exit_codes() {
    let env = Env::new();

    let output = env.record("make", "noon", &at("10:00:00"));
    assert_eq!(output.status.code(), Some(2));

    let output = env.record("make", &at("10:00:05"), &at("10:00:00"));
    assert_eq!(output.status.code(), Some(2));

    let output = env.record("make", &at("10:00:00"), "999999999999");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("outside the supported years"), "{stderr}");

    let output = env.run(&["ignore", "add-regex", "(unclosed"]);
    assert_eq!(output.status.code(), Some(2));

    assert_eq!(env.event_count(), 0);
}

#[test]
fn test_run_passes_through_exit_status() {
    let env = Env::new();

    let output = env.run(&["run", "--", "sh", "-c", "exit 7"]);
    assert_eq!(output.status.code(), Some(7));
    assert_eq!(env.event_count(), 1);

    let output = env.run(&["run", "--", "timetrace-no-such-program"]);
    assert_eq!(output.status.code(), Some(127));
}

#[test]
fn test_export_jsonl() {
    let env = Env::new();
    assert!(env.record("make", &at("10:00:00"), &at("10:00:02")).status.success());
    assert!(env.record("make test", &at("10:05:00"), &at("10:05:01")).status.success());

    let output = env.stdout(&["export", "--format", "jsonl", "--today"]);
    let rows: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["command"], "make");
    assert_eq!(rows[1]["category"], "testing");
    assert_eq!(rows[1]["duration_ms"], 1000);
}

#[test]
fn test_export_csv_to_file() {
    let env = Env::new();
    env.stdout(&["session", "start", "sprint"]);
    assert!(env.record("make", &at("10:00:00"), &at("10:00:02")).status.success());

    let out = env.temp.path().join("events.csv");
    let output = env.run(&["export", "--format", "csv", "--today", "--out", out.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Wrote 1 events"));

    let text = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("id,started_at,finished_at,duration_s,"));
    assert!(lines[1].ends_with(",make,,,other,1,sprint"), "{}", lines[1]);
}

#[test]
fn test_init_does_not_touch_the_store() {
    let env = Env::new();
    let script = env.stdout(&["init", "bash"]);
    assert!(script.contains("timetrace record"));
    assert!(!env.db_path().exists());
}
