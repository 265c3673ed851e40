//! Application configuration management.
//!
//! Handles loading, saving, and accessing the client configuration: the
//! server origin and socket routes, stored credentials, the reconnect
//! policy, and logging preferences. Configuration is persisted as TOML.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{PadError, PadResult};
use crate::platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Stored credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Reconnect policy.
    #[serde(default)]
    pub reconnect: ReconnectSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Origin of the hosting server (e.g., "https://pad.example.com").
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path of the socket endpoint. Empty selects the route default.
    #[serde(default)]
    pub socket_path: String,

    /// Path of the token validation endpoint.
    #[serde(default = "default_validate_path")]
    pub validate_path: String,

    /// Logical channel to join. When set, the channel route is used
    /// instead of the token route.
    #[serde(default)]
    pub channel: Option<String>,

    /// Validate the bearer token before opening the socket.
    #[serde(default = "default_true")]
    pub validate_token: bool,
}

/// Stored credentials handed over by the login flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token for privileged sockets.
    #[serde(default)]
    pub token: Option<String>,

    /// Refresh token, cleared together with the bearer token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Reconnect policy, in milliseconds for TOML friendliness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Delay before the first reconnect attempt.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Cap on the exponential delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Attempts before the client gives up and reports failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound for the random jitter added to every delay.
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_origin() -> String {
    constants::DEFAULT_ORIGIN.to_string()
}

fn default_validate_path() -> String {
    constants::ADMIN_VALIDATE_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> u64 {
    constants::DEFAULT_RECONNECT_DELAY_MS
}

fn default_max_delay() -> u64 {
    constants::DEFAULT_MAX_RECONNECT_DELAY_MS
}

fn default_max_attempts() -> u32 {
    constants::DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_jitter() -> u64 {
    constants::DEFAULT_RECONNECT_JITTER_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            socket_path: String::new(),
            validate_path: default_validate_path(),
            channel: None,
            validate_token: true,
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
            jitter_ms: default_jitter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl ServerConfig {
    /// The socket path to use, falling back to the route default.
    pub fn effective_socket_path(&self) -> &str {
        if !self.socket_path.is_empty() {
            &self.socket_path
        } else if self.channel.is_some() {
            constants::CHANNEL_SOCKET_PATH
        } else {
            constants::ADMIN_SOCKET_PATH
        }
    }
}

impl ReconnectSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> PadResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> PadResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&contents)?;
        config.server.origin = Self::sanitize_origin(&config.server.origin);
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> PadResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PadError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PadResult<PathBuf> {
        Ok(platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> PadResult<PathBuf> {
        if self.logging.directory.is_empty() {
            platform::log_dir()
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Sanitize and normalize a server origin.
    ///
    /// Ensures the origin has a scheme and strips trailing slashes.
    /// Bare hosts default to plain http, like a page served without TLS.
    pub fn sanitize_origin(origin: &str) -> String {
        let trimmed = origin.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let has_scheme = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| trimmed.starts_with(scheme));
        let with_scheme = if has_scheme {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across commands.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }
}
