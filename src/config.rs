use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::models::Warehouse;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAIRS_PER_BOX: u32 = 12;
const DEFAULT_BANDING_MESSAGE: &str = "Warehouse confirmed correct quantities. SPG/B must re-check arrived stock. Possible miscount or fraud indication.";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings the replenishment engine is constructed with.
///
/// Loaded once at startup and handed to the services by value; nothing in the
/// engine reads configuration from ambient state.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Pairs per box used when master data has no entry for an article
    #[serde(default = "default_pairs_per_box")]
    #[validate(range(min = 1, max = 1000))]
    pub default_pairs_per_box: u32,

    /// Warehouse bucket code (lowercase) -> transaction ledger source
    #[serde(default = "default_ledger_sources")]
    #[validate(custom = "validate_ledger_sources")]
    pub ledger_sources: HashMap<String, String>,

    /// Advisory text attached to every banding notice
    #[serde(default = "default_banding_message")]
    #[validate(length(min = 1, message = "banding_message must not be empty"))]
    pub banding_message: String,

    /// Transparent retries for the id sequence and status compare-and-set
    #[serde(default = "default_max_contention_retries")]
    #[validate(range(max = 10))]
    pub max_contention_retries: u32,

    #[serde(default = "default_contention_backoff_ms")]
    #[validate(range(min = 1, max = 5000))]
    pub contention_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_pairs_per_box: default_pairs_per_box(),
            ledger_sources: default_ledger_sources(),
            banding_message: default_banding_message(),
            max_contention_retries: default_max_contention_retries(),
            contention_backoff_ms: default_contention_backoff_ms(),
        }
    }
}

impl EngineConfig {
    /// Ledger source that holds delivery notes for a warehouse bucket.
    pub fn ledger_source(&self, warehouse: Warehouse) -> Option<&str> {
        self.ledger_sources
            .get(&warehouse.code().to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn retry_config(&self) -> crate::db::retry::RetryConfig {
        crate::db::retry::RetryConfig::bounded(
            self.max_contention_retries,
            std::time::Duration::from_millis(self.contention_backoff_ms),
        )
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    /// Host to bind the HTTP server to
    pub host: String,

    /// Port to bind the HTTP server to
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Deployment environment name
    #[validate(length(min = 1, message = "environment must not be empty"))]
    pub environment: String,

    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Run embedded migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the in-process event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Requests running longer than this are answered with 408
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Creates a new configuration
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
            engine: EngineConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Validates the application settings and the engine block.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        self.engine.validate()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_pairs_per_box() -> u32 {
    DEFAULT_PAIRS_PER_BOX
}

fn default_ledger_sources() -> HashMap<String, String> {
    Warehouse::ALL
        .iter()
        .map(|w| {
            let code = w.code().to_ascii_lowercase();
            (code.clone(), format!("transaksi_{}", code))
        })
        .collect()
}

fn default_banding_message() -> String {
    DEFAULT_BANDING_MESSAGE.to_string()
}

fn default_max_contention_retries() -> u32 {
    3
}

fn default_contention_backoff_ms() -> u64 {
    25
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    if !VALID_LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        let mut err = ValidationError::new("log_level");
        err.message = Some("log_level must be one of trace, debug, info, warn, error".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_ledger_sources(sources: &HashMap<String, String>) -> Result<(), ValidationError> {
    let missing: Vec<&str> = Warehouse::ALL
        .iter()
        .map(|w| w.code())
        .filter(|code| {
            sources
                .get(&code.to_ascii_lowercase())
                .map_or(true, |source| source.trim().is_empty())
        })
        .collect();

    if !missing.is_empty() {
        let mut err = ValidationError::new("ledger_sources");
        err.message = Some(format!("missing ledger source for {}", missing.join(", ")).into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("replenishment_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://replenishment.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate_all().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite://replenishment.db?mode=memory".into(),
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_pass_validation() {
        let cfg = base_config();
        assert!(cfg.validate_all().is_ok());
        assert_eq!(cfg.engine.default_pairs_per_box, 12);
    }

    #[test]
    fn every_warehouse_has_a_default_ledger_source() {
        let engine = EngineConfig::default();
        assert_eq!(engine.ledger_source(Warehouse::Ddd), Some("transaksi_ddd"));
        assert_eq!(engine.ledger_source(Warehouse::Ubb), Some("transaksi_ubb"));
    }

    #[test]
    fn missing_ledger_source_is_rejected() {
        let mut cfg = base_config();
        cfg.engine.ledger_sources.remove("mbb");
        let errors = cfg.validate_all().unwrap_err();
        assert!(errors.field_errors().contains_key("ledger_sources"));
    }

    #[test]
    fn zero_pairs_per_box_is_rejected() {
        let mut cfg = base_config();
        cfg.engine.default_pairs_per_box = 0;
        assert!(cfg.validate_all().is_err());
    }

    #[test]
    fn zero_event_channel_capacity_is_rejected() {
        let mut cfg = base_config();
        cfg.event_channel_capacity = 0;
        let errors = cfg.validate_all().unwrap_err();
        assert!(errors.field_errors().contains_key("event_channel_capacity"));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        let errors = cfg.validate_all().unwrap_err();
        assert!(errors.field_errors().contains_key("log_level"));
    }
}
