//! Videocall Controller configuration.
//!
//! Configuration is loaded from environment variables. The RTC provider
//! secret is held in a `SecretString` and the database URL is redacted
//! in Debug output.

use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default RTC provider request timeout in seconds.
pub const DEFAULT_RTC_TIMEOUT_SECS: u64 = 10;

/// Maximum allowed RTC provider request timeout in seconds.
pub const MAX_RTC_TIMEOUT_SECS: u64 = 60;

/// Videocall Controller configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// RTC provider internal API base URL.
    pub rtc_base_url: String,

    /// RTC provider URL handed to clients (defaults to `rtc_base_url`).
    pub rtc_public_url: String,

    /// RTC provider API secret.
    pub rtc_secret: SecretString,

    /// Timeout for RTC provider calls in seconds.
    pub rtc_timeout_secs: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("rtc_base_url", &self.rtc_base_url)
            .field("rtc_public_url", &self.rtc_public_url)
            .field("rtc_secret", &"[REDACTED]")
            .field("rtc_timeout_secs", &self.rtc_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid RTC timeout configuration: {0}")]
    InvalidRtcTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let rtc_base_url = vars
            .get("RTC_BASE_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:4443".to_string());

        let rtc_public_url = vars
            .get("RTC_PUBLIC_URL")
            .cloned()
            .unwrap_or_else(|| rtc_base_url.clone());

        let rtc_secret = vars
            .get("RTC_SECRET")
            .map(|s| SecretString::from(s.as_str()))
            .ok_or_else(|| ConfigError::MissingEnvVar("RTC_SECRET".to_string()))?;

        // Parse RTC timeout with validation
        let rtc_timeout_secs = if let Some(value_str) = vars.get("RTC_TIMEOUT_SECS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRtcTimeout(format!(
                    "RTC_TIMEOUT_SECS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidRtcTimeout(
                    "RTC_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_RTC_TIMEOUT_SECS {
                return Err(ConfigError::InvalidRtcTimeout(format!(
                    "RTC_TIMEOUT_SECS must not exceed {} seconds, got {}",
                    MAX_RTC_TIMEOUT_SECS, value
                )));
            }

            value
        } else {
            DEFAULT_RTC_TIMEOUT_SECS
        };

        Ok(Config {
            database_url,
            bind_address,
            rtc_base_url,
            rtc_public_url,
            rtc_secret,
            rtc_timeout_secs,
        })
    }

    /// WebSocket URL for clients, derived from the public provider URL.
    pub fn rtc_websocket_url(&self) -> String {
        self.rtc_public_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1)
    }
}
