//! SimpleCapture configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::capture::{Credentials, DataConfirmationMode, ScriptStep, default_script};
use crate::dispatch::{ArrivalQuery, MAX_ARRIVAL_QUERIES};

/// Main SimpleCapture configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); --log-level wins over this
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Capture service identity used by the start signal
    pub service: ServiceConfig,

    /// Application credentials presented on open
    pub credentials: CredentialsConfig,

    /// Session acquisition retry policy
    pub acquisition: AcquisitionConfig,

    /// Event dispatch behavior
    pub dispatch: DispatchConfig,

    /// Simulated Capture service
    pub simulator: SimulatorConfig,

    /// File this configuration was read from; `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Configuration problems found by `Config::validate`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("credentials.{0} must not be empty")]
    EmptyCredential(&'static str),

    #[error("dispatch.arrival-queries lists {count} queries, at most {max} are allowed")]
    TooManyArrivalQueries { count: usize, max: usize },

    #[error("dispatch.arrival-queries lists {0:?} twice")]
    DuplicateArrivalQuery(ArrivalQuery),

    #[error("dispatch.notification-buffer must be at least 1")]
    ZeroNotificationBuffer,

    #[error("simulator.event-buffer must be at least 1")]
    ZeroEventBuffer,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<(), ConfigError> {
        debug!("Config::validate: called");
        let credentials = self.credentials.resolve();
        if credentials.app_id.trim().is_empty() {
            return Err(ConfigError::EmptyCredential("app-id"));
        }
        if credentials.developer_id.trim().is_empty() {
            return Err(ConfigError::EmptyCredential("developer-id"));
        }
        if credentials.app_key.trim().is_empty() {
            return Err(ConfigError::EmptyCredential("app-key"));
        }

        let queries = &self.dispatch.arrival_queries;
        if queries.len() > MAX_ARRIVAL_QUERIES {
            return Err(ConfigError::TooManyArrivalQueries {
                count: queries.len(),
                max: MAX_ARRIVAL_QUERIES,
            });
        }
        for (i, query) in queries.iter().enumerate() {
            if queries[..i].contains(query) {
                return Err(ConfigError::DuplicateArrivalQuery(*query));
            }
        }

        if self.dispatch.notification_buffer == 0 {
            return Err(ConfigError::ZeroNotificationBuffer);
        }
        if self.simulator.event_buffer == 0 {
            return Err(ConfigError::ZeroEventBuffer);
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .simplecapture.yml
        let local_config = PathBuf::from(".simplecapture.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/simplecapture/simplecapture.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("simplecapture").join("simplecapture.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let mut config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.source = Some(path.as_ref().to_path_buf());

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Capture service identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Broadcast action understood by the service
    pub action: String,

    /// Package hosting the service
    pub package: String,

    /// Receiver component inside the package
    pub component: String,

    /// Deliver the start broadcast with foreground priority
    #[serde(rename = "receiver-foreground")]
    pub receiver_foreground: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            action: "com.socketmobile.capture.START_SERVICE".to_string(),
            package: "com.socketmobile.companion".to_string(),
            component: "com.socketmobile.capture.StartService".to_string(),
            receiver_foreground: true,
        }
    }
}

/// Application credentials
///
/// The defaults are the vendor's public sample credentials, which work for
/// the demo package only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    #[serde(rename = "app-id")]
    pub app_id: String,

    #[serde(rename = "developer-id")]
    pub developer_id: String,

    #[serde(rename = "app-key")]
    pub app_key: String,

    /// Environment variable that overrides app-key when set
    #[serde(rename = "app-key-env")]
    pub app_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            app_id: "android:com.socketmobile.simplecapturedemo".to_string(),
            developer_id: "bb57d8e1-f911-47ba-b510-693be162686a".to_string(),
            app_key: "MC4CFQC76uXj3J36NLgYLaZP7YevE/A4pgIVAPqOydqV4fv4Gh5v01DJGbaSbY61".to_string(),
            app_key_env: "SCD_APP_KEY".to_string(),
        }
    }
}

impl CredentialsConfig {
    /// Build the credential triple, applying the app-key environment override
    pub fn resolve(&self) -> Credentials {
        debug!(app_key_env = %self.app_key_env, "CredentialsConfig::resolve: called");
        let app_key = match std::env::var(&self.app_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                debug!("CredentialsConfig::resolve: using app key from environment");
                key
            }
            _ => self.app_key.clone(),
        };
        Credentials {
            app_id: self.app_id.clone(),
            developer_id: self.developer_id.clone(),
            app_key,
        }
    }
}

/// Session acquisition retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Maximum number of "not ready" answers tolerated before giving up
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Wait between attempts in milliseconds
    #[serde(rename = "retry-interval-ms")]
    pub retry_interval_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_retries: 60,
            retry_interval_ms: 500,
        }
    }
}

impl AcquisitionConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Event dispatch behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Follow-up queries issued when a device arrives (at most two)
    #[serde(rename = "arrival-queries")]
    pub arrival_queries: Vec<ArrivalQuery>,

    /// Confirmation mode configured on every arriving device
    #[serde(rename = "confirmation-mode")]
    pub confirmation_mode: DataConfirmationMode,

    /// Decoded payloads ending with this suffix get negative feedback
    #[serde(rename = "reject-suffix")]
    pub reject_suffix: String,

    /// Channel buffer size for notifications to the interactive context
    #[serde(rename = "notification-buffer")]
    pub notification_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            arrival_queries: vec![ArrivalQuery::Battery, ArrivalQuery::Firmware],
            confirmation_mode: DataConfirmationMode::App,
            reject_suffix: "6".to_string(),
            notification_buffer: 64,
        }
    }
}

/// Simulated Capture service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Time between the first start signal and the service accepting sessions
    #[serde(rename = "startup-latency-ms")]
    pub startup_latency_ms: u64,

    /// Start without waiting for a start signal
    #[serde(rename = "auto-start")]
    pub auto_start: bool,

    /// Simulated latency of every round trip
    #[serde(rename = "round-trip-ms")]
    pub round_trip_ms: u64,

    /// Broadcast buffer for device events
    #[serde(rename = "event-buffer")]
    pub event_buffer: usize,

    /// Device timeline played by `scd run`
    pub script: Vec<ScriptStep>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            startup_latency_ms: 2_000,
            auto_start: false,
            round_trip_ms: 20,
            event_buffer: 256,
            script: default_script(),
        }
    }
}

impl SimulatorConfig {
    pub fn startup_latency(&self) -> Duration {
        Duration::from_millis(self.startup_latency_ms)
    }

    pub fn round_trip(&self) -> Duration {
        Duration::from_millis(self.round_trip_ms)
    }
}
