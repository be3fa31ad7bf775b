//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tt_db::StoreOptions;

/// Environment variables under the `TIMETRACE_` prefix that are not config keys.
const NON_CONFIG_ENV: &[&str] = &["project", "tag", "log"];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// How long to wait for another process to release the store.
    pub lock_timeout_ms: u64,
    /// Seed the default ignore prefixes into a new store.
    pub seed_default_ignores: bool,
    /// Replace credential-looking arguments before recording.
    pub redact_secrets: bool,
    /// Recorded command text is cut to this many characters.
    pub max_command_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("timetrace.db"),
            lock_timeout_ms: 2000,
            seed_default_ignores: true,
            redact_secrets: true,
            max_command_len: 300,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, the user config file, `config_path`,
    /// then `TIMETRACE_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Capture-time variables share the prefix but aren't settings
        figment = figment.merge(Env::prefixed("TIMETRACE_").filter(|key| {
            !NON_CONFIG_ENV
                .iter()
                .any(|name| key.as_str().eq_ignore_ascii_case(name))
        }));

        figment.extract()
    }

    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub const fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock_timeout: self.lock_timeout(),
            seed_default_ignores: self.seed_default_ignores,
        }
    }
}

/// Returns the platform-specific config directory for timetrace.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("timetrace"))
}

/// Returns the platform-specific data directory for timetrace.
///
/// On Linux: `~/.local/share/timetrace`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("timetrace"))
}
