//! Server configuration
//!
//! Layered lowest to highest: built-in defaults, the TOML file, environment
//! variables, command-line flags.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use band_core::ChatId;
use flow_engine::DEFAULT_FAILURE_NOTICE;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where sessions are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Memory,
    File,
    #[default]
    Sqlite,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(SessionBackend::Memory),
            "file" => Ok(SessionBackend::File),
            "sqlite" => Ok(SessionBackend::Sqlite),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "bandbot")]
#[command(about = "Band assistant chat bot server")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.bandbot/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for session data
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding the sheet-music library
    #[arg(long)]
    pub library_dir: Option<PathBuf>,

    /// Session storage backend
    #[arg(long, value_enum)]
    pub session_backend: Option<SessionBackend>,

    /// Log filter (overrides --debug)
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub library_dir: PathBuf,
    pub session_backend: SessionBackend,
    /// Chat that receives audit reports. Reports are only logged when unset.
    pub log_channel: Option<i64>,
    /// Shown to the user when a message could not be handled.
    pub failure_notice: String,
    pub debug: bool,
}

fn bandbot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".bandbot")
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for BotConfig {
    fn default() -> Self {
        let root = bandbot_dir();
        Self {
            port: 8081,
            data_dir: root.join("data"),
            library_dir: root.join("library"),
            session_backend: SessionBackend::default(),
            log_channel: None,
            failure_notice: DEFAULT_FAILURE_NOTICE.to_string(),
            debug: false,
        }
    }
}

impl BotConfig {
    /// Defaults, then the config file, then the process environment.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = bandbot_dir().join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(port) = lookup("BANDBOT_PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "BANDBOT_PORT",
                value: port,
            })?;
        }
        if let Some(dir) = lookup("BANDBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("BANDBOT_LIBRARY_DIR") {
            self.library_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("BANDBOT_SESSION_BACKEND") {
            self.session_backend = backend
                .parse()
                .map_err(|value| ConfigError::InvalidValue {
                    key: "BANDBOT_SESSION_BACKEND",
                    value,
                })?;
        }
        if let Some(channel) = lookup("LOG_CHANNEL") {
            let channel = channel.trim();
            self.log_channel = if channel.is_empty() {
                None
            } else {
                Some(channel.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "LOG_CHANNEL",
                    value: channel.to_string(),
                })?)
            };
        }
        if let Some(notice) = lookup("BANDBOT_FAILURE_NOTICE") {
            self.failure_notice = notice;
        }
        if let Some(debug) = lookup("BANDBOT_DEBUG") {
            self.debug = parse_bool_env(&debug);
        }
        Ok(self)
    }

    /// Apply command-line flags, which win over everything else.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(dir) = &cli.data_dir {
            self.data_dir = dir.clone();
        }
        if let Some(dir) = &cli.library_dir {
            self.library_dir = dir.clone();
        }
        if let Some(backend) = cli.session_backend {
            self.session_backend = backend;
        }
        self.debug |= cli.debug;
        self
    }

    pub fn log_channel(&self) -> Option<ChatId> {
        self.log_channel.map(ChatId)
    }
}
