//! Configuration system for skychat.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SKYCHAT_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/skychat/config.toml
//!   3. ~/.config/skychat/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkychatConfig {
    pub server: ServerConfig,
    pub history: HistoryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP address the relay listens on.
    pub listen_address: String,
    /// Deadline for writing one line to a client. A client that cannot
    /// take a line within this time is disconnected.
    pub write_timeout_ms: u64,
    /// Lines buffered per client before further output is refused.
    pub outbound_queue: usize,
    /// Longest accepted input line, terminator included.
    pub max_line_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    Memory,
    Sqlite,
    Disabled,
}

impl std::str::FromStr for HistoryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(format!("unknown history backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backend: HistoryBackend,
    /// Database file for the sqlite backend.
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset.
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:3333".to_string(),
            write_timeout_ms: 5_000,
            outbound_queue: 256,
            max_line_bytes: 4_096,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::Memory,
            sqlite_path: data_dir().join("history.db"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl ServerConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("skychat")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("skychat")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

const DEFAULT_HEADER: &str = "\
# skychat relay configuration.
# Environment variables SKYCHAT_<SECTION>__<KEY> override these values,
# e.g. SKYCHAT_SERVER__LISTEN_ADDRESS=0.0.0.0:3333
# history.backend is one of: memory, sqlite, disabled

";

// ── Loading ───────────────────────────────────────────────────────────────────

impl SkychatConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            SkychatConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SKYCHAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_at(&path)?;
        Ok(path)
    }

    /// Write the commented default config to `path` unless a file is
    /// already there. Returns true when a file was written.
    pub fn write_default_at(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let body = toml::to_string_pretty(&SkychatConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        let text = format!("{DEFAULT_HEADER}{body}");
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        Ok(true)
    }

    /// Apply SKYCHAT_* overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SKYCHAT_SERVER__LISTEN_ADDRESS") {
            self.server.listen_address = v;
        }
        if let Some(v) = lookup("SKYCHAT_SERVER__WRITE_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                self.server.write_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("SKYCHAT_SERVER__OUTBOUND_QUEUE") {
            if let Ok(n) = v.parse() {
                self.server.outbound_queue = n;
            }
        }
        if let Some(v) = lookup("SKYCHAT_SERVER__MAX_LINE_BYTES") {
            if let Ok(n) = v.parse() {
                self.server.max_line_bytes = n;
            }
        }
        if let Some(v) = lookup("SKYCHAT_HISTORY__BACKEND") {
            if let Ok(backend) = v.parse() {
                self.history.backend = backend;
            }
        }
        if let Some(v) = lookup("SKYCHAT_HISTORY__SQLITE_PATH") {
            self.history.sqlite_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SKYCHAT_LOG__LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = lookup("SKYCHAT_LOG__FILE") {
            self.log.file = Some(PathBuf::from(v));
        }
    }
}
