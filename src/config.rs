//! Configuration: TOML file with serde defaults, validated on load.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::console::DEFAULT_BACKLOG_CAPACITY;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config validation failed: {message}")]
    ValidationError { message: String },
}

/// Root configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

/// The wrapped simulator process and its session protocol constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Simulator executable to spawn.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments passed to the simulator.
    #[serde(default)]
    pub args: Vec<String>,
    /// Idle marker emitted by the simulator. The trailing space is
    /// significant; any change to the wrapped program's prompt format must
    /// change this value with it.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Command used for a graceful quit.
    #[serde(default = "default_quit_command")]
    pub quit_command: String,
    /// Seconds to wait for the first prompt after spawn.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// Milliseconds granted to a graceful quit before force-kill.
    #[serde(default = "default_quit_grace_ms")]
    pub quit_grace_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            prompt: default_prompt(),
            quit_command: default_quit_command(),
            startup_timeout_secs: default_startup_timeout_secs(),
            quit_grace_ms: default_quit_grace_ms(),
        }
    }
}

impl SimulatorConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port). When the port is taken, the next hundred
    /// ports are tried in order.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Console broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Completed lines retained for replay to late subscribers.
    #[serde(default = "default_backlog_capacity")]
    pub backlog_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: default_backlog_capacity(),
        }
    }
}

fn default_command() -> String {
    "sim".to_string()
}

fn default_prompt() -> String {
    "sim> ".to_string()
}

fn default_quit_command() -> String {
    "EXIT".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_quit_grace_ms() -> u64 {
    2000
}

fn default_bind_addr() -> String {
    "127.0.0.1:8750".to_string()
}

fn default_backlog_capacity() -> usize {
    DEFAULT_BACKLOG_CAPACITY
}

impl Config {
    /// Returns the path to the configuration file,
    /// `<config dir>/simbridge/config.toml`, falling back to the current
    /// directory when no config dir is available.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("simbridge").join("config.toml")
    }

    /// Loads configuration from the default config file, or defaults when
    /// the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulator.command.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "simulator.command must not be empty".to_string(),
            });
        }
        if self.simulator.prompt.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "simulator.prompt must not be empty".to_string(),
            });
        }
        if self.console.backlog_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "console.backlog_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
