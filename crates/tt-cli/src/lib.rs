//! TimeTrace CLI library.
//!
//! This crate provides the `timetrace` command: capturing command runs,
//! managing sessions and ignore rules, and reporting recorded time.

pub mod capture;
mod cli;
pub mod commands;
mod config;
pub mod exit;

pub use cli::{
    CategoryArg, Cli, Commands, ExportFormat, FilterArgs, GroupByArg, IgnoreAction, SessionAction,
    Shell, WindowArgs,
};
pub use config::Config;
