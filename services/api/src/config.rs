//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
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
    pub database_url: String,
    pub log_level: Level,
    pub frontend_origin: String,
    /// Distinct signing secrets for the two token kinds.
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub session_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub user_id_salt: String,
    pub coze_api_key: String,
    pub coze_bot_id: String,
    pub coze_base_url: String,
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

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let frontend_origin = std::env::var("FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load Credential Settings ---
        // Missing signing secrets are fatal here, at startup, never per-call.
        let jwt_access_secret = required("JWT_ACCESS_SECRET")?;
        let jwt_refresh_secret = required("JWT_REFRESH_SECRET")?;
        if jwt_access_secret == jwt_refresh_secret {
            return Err(ConfigError::InvalidValue(
                "JWT_REFRESH_SECRET".to_string(),
                "must differ from JWT_ACCESS_SECRET".to_string(),
            ));
        }
        let session_secret = required("SESSION_SECRET")?;

        let access_token_ttl_secs = seconds("ACCESS_TOKEN_TTL_SECS", 15 * 60)?;
        let refresh_token_ttl_secs = seconds("REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?;
        if access_token_ttl_secs >= refresh_token_ttl_secs {
            return Err(ConfigError::InvalidValue(
                "ACCESS_TOKEN_TTL_SECS".to_string(),
                "must be shorter than REFRESH_TOKEN_TTL_SECS".to_string(),
            ));
        }
        let session_ttl_secs = seconds("SESSION_TTL_SECS", 24 * 60 * 60)?;

        let user_id_salt = std::env::var("USER_ID_SALT")
            .unwrap_or_else(|_| "default-salt-for-user-id-generation".to_string());

        // --- Load Backend Settings ---
        let coze_api_key = required("COZE_API_KEY")?;
        let coze_bot_id = required("COZE_BOT_ID")?;
        let coze_base_url =
            std::env::var("COZE_BASE_URL").unwrap_or_else(|_| "https://api.coze.cn".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            frontend_origin,
            jwt_access_secret,
            jwt_refresh_secret,
            session_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            session_ttl_secs,
            user_id_salt,
            coze_api_key,
            coze_bot_id,
            coze_base_url,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn seconds(name: &str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    name.to_string(),
                    format!("'{}' is not a positive number of seconds", raw),
                )
            }),
        Err(_) => Ok(default),
    }
}
