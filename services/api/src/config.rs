//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    pub gemini_api_key: String,
    pub vision_api_base: String,
    pub vision_model: String,
    pub vision_timeout: Duration,
    pub elder_name: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub scheduler_poll: Duration,
    pub notify_delay: Duration,
    pub daily_reset: bool,
    pub seed_default_tasks: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Vision Service ---
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let vision_api_base = var_or(
            "VISION_API_BASE",
            "https://generativelanguage.googleapis.com/v1beta/openai",
        );
        let vision_model = var_or("VISION_MODEL", "gemini-3-flash-preview");
        let vision_timeout = Duration::from_millis(parse_u64(&lookup, "VISION_TIMEOUT_MS", 30_000)?);
        if vision_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "VISION_TIMEOUT_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- People ---
        let elder_name = var_or("ELDER_NAME", "Antonio");
        let contact_name = var_or("FAMILY_CONTACT_NAME", "Juan (son)");
        let contact_phone = var_or("FAMILY_CONTACT_PHONE", "+34600000000");

        // --- Workflow Timing ---
        let scheduler_poll = Duration::from_millis(parse_u64(&lookup, "SCHEDULER_POLL_MS", 1000)?);
        if scheduler_poll.is_zero() || scheduler_poll > Duration::from_secs(60) {
            return Err(ConfigError::InvalidValue(
                "SCHEDULER_POLL_MS".to_string(),
                "must be between 1 and 60000 so no minute is skipped".to_string(),
            ));
        }
        let notify_delay = Duration::from_millis(parse_u64(&lookup, "NOTIFY_DELAY_MS", 1500)?);
        let daily_reset = parse_bool(&lookup, "DAILY_RESET", false)?;
        let seed_default_tasks = parse_bool(&lookup, "SEED_DEFAULT_TASKS", true)?;

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            gemini_api_key,
            vision_api_base,
            vision_model,
            vision_timeout,
            elder_name,
            contact_name,
            contact_phone,
            scheduler_poll,
            notify_delay,
            daily_reset,
            seed_default_tasks,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "1" || v == "true" || v == "yes" => Ok(true),
        Some(v) if v == "0" || v == "false" || v == "no" => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", v),
        )),
    }
}
