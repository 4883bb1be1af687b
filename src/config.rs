//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::realtime::ReconnectPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Realtime channel configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Query parameter carrying the auth token
    #[serde(default = "default_token_param")]
    pub token_param: String,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_token_param() -> String {
    "token".to_string()
}

fn default_heartbeat_interval() -> u64 {
    30_000 // 30 seconds
}

fn default_reconnect_base_delay() -> u64 {
    1000
}

fn default_reconnect_max_delay() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10_000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token_param: default_token_param(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl RealtimeConfig {
    /// Config for an endpoint with all other settings at their defaults
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Zero disables the heartbeat
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("expeta").join("realtime.toml")),
            Some(PathBuf::from("./expeta.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("EXPETA_WS_URL") {
            self.realtime.url = url;
        }
        if let Some(param) = lookup("EXPETA_WS_TOKEN_PARAM") {
            self.realtime.token_param = param;
        }
        if let Some(ms) = lookup("EXPETA_HEARTBEAT_MS").and_then(|v| v.parse().ok()) {
            self.realtime.heartbeat_interval_ms = ms;
        }
        if let Some(max) = lookup("EXPETA_MAX_RECONNECT_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.realtime.max_reconnect_attempts = max;
        }

        if let Some(level) = lookup("EXPETA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("EXPETA_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Expeta Realtime Configuration
#
# Environment variables override these settings:
# - EXPETA_WS_URL
# - EXPETA_WS_TOKEN_PARAM
# - EXPETA_HEARTBEAT_MS
# - EXPETA_MAX_RECONNECT_ATTEMPTS
# - EXPETA_LOG_LEVEL
# - EXPETA_LOG_FORMAT

[realtime]
# WebSocket endpoint of the Expeta backend
url = "ws://localhost:3000/ws"

# Query parameter that carries the auth token
token_param = "token"

# Heartbeat ping interval (ms, 0 disables)
heartbeat_interval_ms = 30000

# First reconnect delay (ms); doubles after each consecutive failure
reconnect_base_delay_ms = 1000

# Upper bound for a single reconnect delay (ms)
reconnect_max_delay_ms = 30000

# Consecutive failures tolerated before giving up
max_reconnect_attempts = 5

# Handshake timeout (ms)
connect_timeout_ms = 10000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.realtime.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.realtime.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.realtime.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_default_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.realtime, RealtimeConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[realtime]\nurl = \"wss://api.expeta.dev/ws\"\nmax_reconnect_attempts = 8"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.realtime.url, "wss://api.expeta.dev/ws");
        assert_eq!(config.realtime.max_reconnect_attempts, 8);
        assert_eq!(config.realtime.token_param, "token");
        assert_eq!(config.realtime.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[realtime\nurl = ").unwrap();
        let invalid = Config::load(file.path());
        assert!(matches!(invalid, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("EXPETA_WS_URL", "ws://override/ws"),
            ("EXPETA_HEARTBEAT_MS", "0"),
            ("EXPETA_MAX_RECONNECT_ATTEMPTS", "not-a-number"),
            ("EXPETA_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.realtime.url, "ws://override/ws");
        assert!(config.realtime.heartbeat_interval().is_zero());
        // Unparseable values leave the setting alone
        assert_eq!(config.realtime.max_reconnect_attempts, 5);
        assert_eq!(config.logging.format, "json");
    }
}
