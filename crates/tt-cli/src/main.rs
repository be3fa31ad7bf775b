use std::fs::File;
use std::io::{BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use tt_cli::commands::util::{Window, event_filter, resolve_window};
use tt_cli::commands::{export, ignore, init, list, record, report, run, session};
use tt_cli::exit::{self, exit_code_for};
use tt_cli::{Cli, Commands, Config, FilterArgs, IgnoreAction, SessionAction, WindowArgs};
use tt_core::RuleKind;
use tt_db::{Database, EventFilter};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(cli: &Cli) -> Result<(Database, Config)> {
    let mut config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = &cli.db {
        config.database_path.clone_from(path);
    }
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open_with(&config.database_path, &config.store_options())
        .context("failed to open database")?;
    Ok((db, config))
}

/// Resolves window flags in local time and builds the store filter.
fn local_filter(window: &WindowArgs, filters: &FilterArgs) -> Result<(Window, EventFilter)> {
    let window = resolve_window(window, filters.session.is_some(), Local::now().date_naive(), &Local);
    let filter = event_filter(&window, filters)?;
    Ok((window, filter))
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn dispatch(cli: &Cli) -> Result<u8> {
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Run {
            project,
            tag,
            cwd,
            command,
        }) => {
            let (mut db, config) = open_database(cli)?;
            let options = run::RunOptions {
                project: project.clone(),
                tag: tag.clone(),
                cwd: cwd.clone(),
                command: command.clone(),
            };
            // The wrapped command owns stdout
            return run::run(&mut std::io::stderr(), &mut db, &config, options);
        }
        Some(Commands::Record {
            started,
            finished,
            command,
            exit_code,
            cwd,
            project,
            tag,
        }) => {
            let (mut db, config) = open_database(cli)?;
            let options = record::RecordOptions {
                started: started.clone(),
                finished: finished.clone(),
                command: command.clone(),
                exit_code: *exit_code,
                cwd: cwd.clone(),
                project: project.clone(),
                tag: tag.clone(),
            };
            record::run(&mut stdout, &mut db, &config, options)?;
        }
        Some(Commands::Session(action)) => {
            let (mut db, _config) = open_database(cli)?;
            match action {
                SessionAction::Start { name } => session::start(&mut stdout, &mut db, name)?,
                SessionAction::Stop => session::stop(&mut stdout, &mut db)?,
                SessionAction::Status => session::status(&mut stdout, &db)?,
                SessionAction::List { limit } => session::list(&mut stdout, &db, *limit)?,
            }
        }
        Some(Commands::Ignore(action)) => {
            let (mut db, _config) = open_database(cli)?;
            match action {
                IgnoreAction::List => ignore::list(&mut stdout, &db)?,
                IgnoreAction::AddPrefix { text } => {
                    ignore::add(&mut stdout, &mut db, RuleKind::Prefix, text)?;
                }
                IgnoreAction::AddExact { text } => {
                    ignore::add(&mut stdout, &mut db, RuleKind::Exact, text)?;
                }
                IgnoreAction::AddRegex { pattern } => {
                    ignore::add(&mut stdout, &mut db, RuleKind::Regex, pattern)?;
                }
                IgnoreAction::RemovePrefix { text } => {
                    ignore::remove(&mut stdout, &mut db, RuleKind::Prefix, text)?;
                }
                IgnoreAction::RemoveExact { text } => {
                    ignore::remove(&mut stdout, &mut db, RuleKind::Exact, text)?;
                }
                IgnoreAction::RemoveRegex { pattern } => {
                    ignore::remove(&mut stdout, &mut db, RuleKind::Regex, pattern)?;
                }
            }
        }
        Some(Commands::Report {
            window,
            filters,
            group_by,
            json,
        }) => {
            let (window, filter) = local_filter(window, filters)?;
            let (db, _config) = open_database(cli)?;
            report::run(&mut stdout, &db, window, filter, (*group_by).into(), *json)?;
        }
        Some(Commands::List { limit }) => {
            let (db, _config) = open_database(cli)?;
            list::run(&mut stdout, &db, *limit)?;
        }
        Some(Commands::Export {
            format,
            window,
            filters,
            out,
        }) => {
            let (_window, filter) = local_filter(window, filters)?;
            let (db, _config) = open_database(cli)?;
            if let Some(path) = out {
                let file = File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                let mut file = BufWriter::new(file);
                let count = export::run(&mut file, &db, *format, &filter)?;
                file.flush()?;
                eprintln!("Wrote {count} events to {}", path.display());
            } else {
                export::run(&mut stdout, &db, *format, &filter)?;
            }
        }
        Some(Commands::Init { shell }) => {
            // Init doesn't touch the store
            init::run(&mut stdout, *shell)?;
        }
        None => {
            // No subcommand, show help
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(exit::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TIMETRACE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match dispatch(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}
