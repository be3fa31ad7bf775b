//! CLI subcommand implementations.

pub mod export;
pub mod ignore;
pub mod init;
pub mod list;
pub mod record;
pub mod report;
pub mod run;
pub mod session;
pub mod util;
