//! Server configuration.
//!
//! Defaults, optionally replaced by a TOML file, then by command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind: SocketAddr,
    /// SQLite database file
    pub database: PathBuf,
    /// Directory holding one `<username>.html` per patient
    pub reports_dir: PathBuf,
    /// Sessions idle longer than this are deleted
    pub session_ttl_minutes: u64,
    /// How often idle sessions are purged
    pub purge_interval_minutes: u64,
}

/// Longest honoured session lifetime, roughly a century.
const MAX_SESSION_TTL_MINUTES: u64 = 100 * 365 * 24 * 60;

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            database: PathBuf::from("nutri-plan.db"),
            reports_dir: PathBuf::from("patient_data"),
            session_ttl_minutes: 12 * 60,
            purge_interval_minutes: 30,
        }
    }
}

impl Config {
    /// Read a TOML file. Keys left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Idle lifetime of a session, capped at [`MAX_SESSION_TTL_MINUTES`].
    pub fn session_ttl(&self) -> chrono::Duration {
        let minutes = self.session_ttl_minutes.min(MAX_SESSION_TTL_MINUTES);
        chrono::Duration::minutes(minutes as i64)
    }

    /// Time between session purges, at least one minute.
    pub fn purge_interval(&self) -> std::time::Duration {
        let minutes = self.purge_interval_minutes.max(1);
        std::time::Duration::from_secs(minutes.saturating_mul(60))
    }
}
