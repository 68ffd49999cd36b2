//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base service address; REST lives under `{base_url}/api/`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Sent as the `organization_key` query parameter when set
    #[serde(default)]
    pub organization_key: Option<String>,

    /// Sent as a bearer token when set
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            organization_key: None,
            auth_token: None,
        }
    }
}

/// Live event stream configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket path appended to the base address
    #[serde(default = "default_ws_path")]
    pub path: String,

    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Fixed delay before a reconnect attempt
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Pause between the disconnect and connect halves of a manual reconnect
    #[serde(default = "default_manual_reconnect_delay")]
    pub manual_reconnect_delay_ms: u64,
}

fn default_ws_path() -> String {
    "/ws/person/".to_string()
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_interval() -> u64 {
    3000
}

fn default_manual_reconnect_delay() -> u64 {
    100
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            path: default_ws_path(),
            auto_reconnect: default_auto_reconnect(),
            reconnect_interval_ms: default_reconnect_interval(),
            manual_reconnect_delay_ms: default_manual_reconnect_delay(),
        }
    }
}

impl RealtimeConfig {
    /// WebSocket URL derived from the HTTP base address
    ///
    /// `http://host` becomes `ws://host{path}`, `https://` becomes `wss://`.
    pub fn endpoint(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };

        if self.path.starts_with('/') {
            format!("{}{}", ws_base, self.path)
        } else {
            format!("{}/{}", ws_base, self.path)
        }
    }
}

/// Listing pagination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl PaginationConfig {
    /// Page size clamped to what the listing endpoint accepts
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
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
            dirs::config_dir().map(|p| p.join("roster").join("config.toml")),
            Some(PathBuf::from("/etc/roster/config.toml")),
            Some(PathBuf::from("./roster.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// WebSocket endpoint for the person event stream
    pub fn realtime_endpoint(&self) -> String {
        self.realtime.endpoint(&self.api.base_url)
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ROSTER_BACKEND_URL") {
            self.api.base_url = url;
        }
        if let Ok(key) = std::env::var("ROSTER_ORGANIZATION_KEY") {
            self.api.organization_key = Some(key);
        }
        if let Ok(token) = std::env::var("ROSTER_AUTH_TOKEN") {
            self.api.auth_token = Some(token);
        }

        if let Ok(size) = std::env::var("ROSTER_PAGE_SIZE") {
            if let Ok(s) = size.parse() {
                self.pagination.page_size = s;
            }
        }

        if let Ok(interval) = std::env::var("ROSTER_RECONNECT_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.realtime.reconnect_interval_ms = ms;
            }
        }

        if let Ok(level) = std::env::var("ROSTER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ROSTER_LOG_FORMAT") {
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
    r#"# Roster Configuration
#
# Environment variables override these settings:
# - ROSTER_BACKEND_URL
# - ROSTER_ORGANIZATION_KEY
# - ROSTER_AUTH_TOKEN
# - ROSTER_PAGE_SIZE
# - ROSTER_RECONNECT_INTERVAL_MS
# - ROSTER_LOG_LEVEL
# - ROSTER_LOG_FORMAT

[api]
# Backend service address (REST is served under /api/)
base_url = "http://localhost:8000"

# Request timeout in seconds
request_timeout_secs = 30

# Organization key sent with every request
# organization_key = ""

# Static bearer token
# auth_token = ""

[realtime]
# Person event stream path (scheme is derived from base_url)
path = "/ws/person/"

# Reconnect automatically after an unexpected close
auto_reconnect = true

# Delay before a reconnect attempt (ms)
reconnect_interval_ms = 3000

# Pause inside a manual reconnect (ms)
manual_reconnect_delay_ms = 100

[pagination]
# Persons per page (1-100)
page_size = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
