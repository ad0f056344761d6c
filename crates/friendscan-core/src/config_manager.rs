use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::contact::StatusCodes;
use crate::session::DEFAULT_DEVICE_ID;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for friendscan
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FriendscanConfig {
    /// Batching, pacing and retry settings for the probe
    #[serde(default)]
    pub probe: ProbeConfig,

    /// HTTP client settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Session identity settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Raw response dumps
    #[serde(default)]
    pub debug: DebugConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Probe engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Contacts per group-chat probe
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fixed pause between consecutive batches (seconds).
    /// 13s has been observed to trigger "operating too frequently".
    #[serde(default = "default_inter_batch_delay_secs")]
    pub inter_batch_delay_secs: u64,

    /// Total attempts per group call, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry backoff (seconds); defaults to the inter-batch delay
    #[serde(default)]
    pub initial_retry_delay_secs: Option<u64>,

    /// Member status code meaning "no longer a friend"
    #[serde(default = "default_former_friend_status")]
    pub former_friend_status: i64,

    /// Member status code of an ordinary member
    #[serde(default)]
    pub normal_status: i64,

    /// Width of the ASCII progress bar
    #[serde(default = "default_progress_width")]
    pub progress_width: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_secs: default_inter_batch_delay_secs(),
            max_attempts: default_max_attempts(),
            initial_retry_delay_secs: None,
            former_friend_status: default_former_friend_status(),
            normal_status: 0,
            progress_width: default_progress_width(),
        }
    }
}

impl ProbeConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_secs(self.inter_batch_delay_secs)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_secs(
            self.initial_retry_delay_secs
                .unwrap_or(self.inter_batch_delay_secs),
        )
    }

    pub fn status_codes(&self) -> StatusCodes {
        StatusCodes {
            normal: self.normal_status,
            former_friend: self.former_friend_status,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Hard per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// The web endpoints are reached with certificate verification relaxed
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            accept_invalid_certs: default_accept_invalid_certs(),
            user_agent: default_user_agent(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Session identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Synthetic device id sent with every request
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Upper bound on login status polls before giving up
    #[serde(default = "default_max_login_polls")]
    pub max_login_polls: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            max_login_polls: default_max_login_polls(),
        }
    }
}

/// Debug dump configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebugConfig {
    /// Write every raw API response body to disk
    #[serde(default)]
    pub dump_responses: bool,

    /// Directory for dumps (defaults to the current directory)
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_inter_batch_delay_secs() -> u64 {
    16
}
fn default_max_attempts() -> u32 {
    4
}
fn default_former_friend_status() -> i64 {
    StatusCodes::default().former_friend
}
fn default_progress_width() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_accept_invalid_certs() -> bool {
    true
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}
fn default_device_id() -> String {
    DEFAULT_DEVICE_ID.to_string()
}
fn default_max_login_polls() -> u32 {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: FriendscanConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (explicit path, ./.friendscan.toml, ~/.friendscan/config.toml)
    /// 3. Defaults
    ///
    /// Command line flags are applied on top by the caller.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        if let Some(ref path) = config_path {
            info!("Config file: {}", path.display());
        } else {
            info!("Config file: none (using defaults)");
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Wrap an already-built configuration, validating it first.
    pub fn from_config(config: FriendscanConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".friendscan.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .friendscan.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.friendscan.toml
    /// 2. ~/.friendscan/config.toml
    /// 3. defaults
    fn load_config_file() -> Result<(FriendscanConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".friendscan.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".friendscan").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((FriendscanConfig::default(), None))
    }

    pub fn read_toml_file(path: &Path) -> Result<FriendscanConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(config: FriendscanConfig) -> FriendscanConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; the environment in production.
    pub fn apply_overrides<F>(mut config: FriendscanConfig, lookup: F) -> FriendscanConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = lookup("FRIENDSCAN_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            config.probe.batch_size = size;
        }
        if let Some(delay) = lookup("FRIENDSCAN_DELAY_SECS").and_then(|v| v.parse().ok()) {
            config.probe.inter_batch_delay_secs = delay;
        }
        if let Some(attempts) = lookup("FRIENDSCAN_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.probe.max_attempts = attempts;
        }
        if let Some(status) = lookup("FRIENDSCAN_FORMER_FRIEND_STATUS").and_then(|v| v.parse().ok())
        {
            config.probe.former_friend_status = status;
        }
        if let Some(device_id) = lookup("FRIENDSCAN_DEVICE_ID") {
            config.session.device_id = device_id;
        }
        if let Some(timeout) = lookup("FRIENDSCAN_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.transport.timeout_secs = timeout;
        }
        if let Some(debug) = lookup("FRIENDSCAN_DEBUG") {
            config.debug.dump_responses = debug.to_lowercase() == "true" || debug == "1";
        }
        if let Some(dir) = lookup("FRIENDSCAN_DUMP_DIR") {
            config.debug.dump_dir = Some(PathBuf::from(dir));
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    pub fn validate_config(config: &FriendscanConfig) -> Result<(), ConfigError> {
        if config.probe.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "probe.batch_size must be at least 1".to_string(),
            ));
        }
        if config.probe.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "probe.max_attempts must be at least 1".to_string(),
            ));
        }
        if config.probe.progress_width == 0 {
            return Err(ConfigError::ValidationError(
                "probe.progress_width must be at least 1".to_string(),
            ));
        }
        if config.probe.former_friend_status == config.probe.normal_status {
            return Err(ConfigError::ValidationError(
                "probe.former_friend_status must differ from probe.normal_status".to_string(),
            ));
        }
        if config.transport.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transport.timeout_secs must be at least 1".to_string(),
            ));
        }

        // RUST_LOG may carry directives such as "friendscan=debug"; only plain
        // levels are checked.
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level.to_ascii_lowercase().as_str() {
                "off" | "trace" | "debug" | "info" | "warn" | "error" => {}
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: off, trace, debug, info, warn, error",
                        level
                    )))
                }
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &FriendscanConfig {
        &self.config
    }

    pub fn into_config(self) -> FriendscanConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = FriendscanConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = FriendscanConfig::default();
        assert_eq!(config.probe.batch_size, 34);
        assert_eq!(config.probe.inter_batch_delay_secs, 16);
        assert_eq!(config.probe.former_friend_status, 4);
        assert_eq!(config.probe.initial_retry_delay(), Duration::from_secs(16));
        assert_eq!(config.session.device_id, "e000000000000000");
        assert!(config.transport.accept_invalid_certs);
        assert!(!config.debug.dump_responses);
    }

    #[test]
    fn test_config_validation() {
        let config = FriendscanConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad = config.clone();
        bad.probe.batch_size = 0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.probe.max_attempts = 0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.logging.level = "loud".to_string();
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut directive = config;
        directive.logging.level = "friendscan_probe=debug".to_string();
        assert!(ConfigManager::validate_config(&directive).is_ok());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("FRIENDSCAN_BATCH_SIZE", "35"),
            ("FRIENDSCAN_DELAY_SECS", "20"),
            ("FRIENDSCAN_DEBUG", "1"),
            ("FRIENDSCAN_DEVICE_ID", "e123"),
            ("FRIENDSCAN_MAX_ATTEMPTS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ConfigManager::apply_overrides(FriendscanConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.probe.batch_size, 35);
        assert_eq!(config.probe.inter_batch_delay_secs, 20);
        assert!(config.debug.dump_responses);
        assert_eq!(config.session.device_id, "e123");
        // unparsable values leave the default in place
        assert_eq!(config.probe.max_attempts, 4);
    }

    #[test]
    fn test_rust_log_levels_accepted_in_any_case() {
        for value in ["off", "OFF", "INFO", "Debug", "warn"] {
            let config = ConfigManager::apply_overrides(FriendscanConfig::default(), |key| {
                (key == "RUST_LOG").then(|| value.to_string())
            });
            assert_eq!(config.logging.level, value);
            assert!(
                ConfigManager::validate_config(&config).is_ok(),
                "{} should be accepted",
                value
            );
        }
    }
}
