//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tt_core::{Category, GroupBy};

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0  success (including commands skipped by an ignore rule)
  1  unexpected failure
  2  invalid input
  3  session conflict (already running / none running)
  4  store busy, safe to retry

`timetrace run` exits with the wrapped command's status (127 if it was not found).";

/// Track how long your shell commands take.
///
/// Records each command's wall-clock time in a local store and reports where
/// the time went, grouped by project, tag, day, session, command or category.
#[derive(Debug, Parser)]
#[command(name = "timetrace", version, about, long_about = None, after_help = EXIT_CODES_HELP)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database file (overrides the config).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a command and record how long it took.
    Run {
        /// Project name for grouping (default: $TIMETRACE_PROJECT or the cwd name).
        #[arg(long)]
        project: Option<String>,

        /// Tag to attach (default: $TIMETRACE_TAG).
        #[arg(long)]
        tag: Option<String>,

        /// Directory to run the command in.
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// The command to run, after `--`.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Record a command that already ran (used by shell hooks).
    Record {
        /// Start time: RFC 3339, a local date-time, or Unix seconds.
        #[arg(long)]
        started: String,

        /// Finish time, in the same formats as --started.
        #[arg(long)]
        finished: String,

        /// The command line as typed.
        #[arg(long)]
        command: String,

        /// Exit code.
        #[arg(long = "exit", allow_negative_numbers = true)]
        exit_code: Option<i32>,

        /// Working directory the command ran in.
        #[arg(long)]
        cwd: Option<PathBuf>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        tag: Option<String>,
    },

    /// Manage work sessions.
    #[command(subcommand)]
    Session(SessionAction),

    /// Manage rules that exclude commands from tracking.
    #[command(subcommand)]
    Ignore(IgnoreAction),

    /// Summarize recorded time.
    Report {
        #[command(flatten)]
        window: WindowArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Grouping key.
        #[arg(long = "by", value_enum, default_value_t = GroupByArg::Project)]
        group_by: GroupByArg,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List recently recorded events.
    List {
        /// Number of events to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Export recorded events.
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        #[command(flatten)]
        window: WindowArgs,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output file (default: stdout).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print shell integration code.
    Init {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Session subcommands.
#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// Start a named session.
    Start { name: String },
    /// Stop the running session.
    Stop,
    /// Show the running session.
    Status,
    /// List recent sessions.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

/// Ignore rule subcommands.
#[derive(Debug, Subcommand)]
pub enum IgnoreAction {
    /// Show ignore rules in evaluation order.
    List,
    /// Ignore commands starting with TEXT.
    AddPrefix { text: String },
    /// Ignore commands equal to TEXT.
    AddExact { text: String },
    /// Ignore commands matching PATTERN anywhere.
    AddRegex { pattern: String },
    RemovePrefix { text: String },
    RemoveExact { text: String },
    RemoveRegex { pattern: String },
}

/// Time window selection. Defaults to today.
#[derive(Debug, Clone, Default, Args)]
#[group(multiple = false)]
pub struct WindowArgs {
    /// Today, local time.
    #[arg(long)]
    pub today: bool,

    /// Yesterday, local time.
    #[arg(long)]
    pub yesterday: bool,

    /// The last N calendar days, including today.
    #[arg(long, value_name = "DAYS", value_parser = clap::value_parser!(u32).range(1..))]
    pub last: Option<u32>,
}

/// Event filters shared by `report` and `export`.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only events captured in this session (searches all time unless a window is given).
    #[arg(long)]
    pub session: Option<i64>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub tag: Option<String>,

    #[arg(long, value_enum)]
    pub category: Option<CategoryArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupByArg {
    Project,
    Tag,
    Day,
    Session,
    Command,
    Category,
}

impl From<GroupByArg> for GroupBy {
    fn from(arg: GroupByArg) -> Self {
        match arg {
            GroupByArg::Project => Self::Project,
            GroupByArg::Tag => Self::Tag,
            GroupByArg::Day => Self::Day,
            GroupByArg::Session => Self::Session,
            GroupByArg::Command => Self::Command,
            GroupByArg::Category => Self::Category,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Git,
    Container,
    Testing,
    Build,
    Lint,
    Node,
    Other,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Git => Self::Git,
            CategoryArg::Container => Self::Container,
            CategoryArg::Testing => Self::Testing,
            CategoryArg::Build => Self::Build,
            CategoryArg::Lint => Self::Lint,
            CategoryArg::Node => Self::Node,
            CategoryArg::Other => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// A pretty-printed JSON array.
    Json,
    /// One JSON object per line.
    Jsonl,
    /// Comma-separated values with a header row.
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Powershell,
}
