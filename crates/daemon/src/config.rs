//! Configuration management for the MenuShell daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/menushell/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionLimits;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_sessions must be between 1 and 64, got {0}")]
    InvalidMaxSessions(usize),

    #[error("receive_buffer_len must be between 2 and 1024, got {0}")]
    InvalidReceiveBufferLen(usize),

    #[error("tick_interval_ms must be between 1 and 1000, got {0}")]
    InvalidTickInterval(u64),

    #[error("accept_backlog must be greater than 0, got {0}")]
    InvalidAcceptBacklog(usize),

    #[error("listen_addr must be a socket address such as 0.0.0.0:23, got {0}")]
    InvalidListenAddr(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the MenuShell daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Network-related configuration.
    pub network: NetworkConfig,

    /// Session slot configuration.
    pub session: SessionConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Project name shown in the welcome banner.
    pub name: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to accept connections on.
    pub listen_addr: String,

    /// Disable Nagle's algorithm on accepted sockets.
    pub no_delay: bool,

    /// Accepted connections that may wait for the next tick.
    pub accept_backlog: usize,
}

/// Session slot configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of concurrent sessions.
    pub max_sessions: usize,

    /// Receive buffer length; a line holds one character less.
    pub receive_buffer_len: usize,

    /// Default idle timeout in minutes (0 = never time out).
    pub idle_timeout_mins: u16,

    /// Seconds before the idle disconnect at which the warning is sent.
    pub idle_warning_secs: u64,

    /// Supervisor tick interval in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            name: "MenuShell".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:23".to_string(),
            no_delay: true,
            accept_backlog: 16,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: protocol::DEFAULT_MAX_SESSIONS,
            receive_buffer_len: protocol::DEFAULT_RECEIVE_BUFFER_LEN,
            idle_timeout_mins: 60,
            idle_warning_secs: 300,
            tick_interval_ms: 10,
        }
    }
}

impl SessionConfig {
    /// Converts to the limits the session supervisor runs with.
    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_sessions: self.max_sessions,
            receive_buffer_len: self.receive_buffer_len,
            idle_timeout: Duration::from_secs(u64::from(self.idle_timeout_mins) * 60),
            idle_warning: Duration::from_secs(self.idle_warning_secs),
        }
    }

    /// Supervisor tick interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("menushell")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - MENUSHELL_LISTEN_ADDR: Override the listen address
    /// - MENUSHELL_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("MENUSHELL_LISTEN_ADDR") {
            if !addr.is_empty() {
                tracing::info!("Overriding listen_addr from environment: {}", addr);
                self.network.listen_addr = addr;
            }
        }

        if let Ok(level) = std::env::var("MENUSHELL_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = &self.session;
        if !(1..=64).contains(&session.max_sessions) {
            return Err(ConfigError::InvalidMaxSessions(session.max_sessions));
        }
        if !(2..=1024).contains(&session.receive_buffer_len) {
            return Err(ConfigError::InvalidReceiveBufferLen(session.receive_buffer_len));
        }
        if !(1..=1000).contains(&session.tick_interval_ms) {
            return Err(ConfigError::InvalidTickInterval(session.tick_interval_ms));
        }

        if self.network.accept_backlog == 0 {
            return Err(ConfigError::InvalidAcceptBacklog(self.network.accept_backlog));
        }
        if self.network.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddr(self.network.listen_addr.clone()));
        }

        if self.daemon.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
