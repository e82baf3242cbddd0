//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use crate::credentials::PasswordHashing;
use family_records_core::domain::Role;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Upper bound on `SESSION_TTL_DAYS`.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which document store backs uploads. Chosen once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
        base_url: String,
        /// `None` means a random secret is generated for this process.
        url_secret: Option<String>,
    },
    Supabase {
        url: String,
        api_key: String,
        bucket: String,
    },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
    pub registration_role: Role,
    pub signed_url_ttl: Duration,
    pub session_ttl: chrono::Duration,
    pub password_hashing: PasswordHashing,
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

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| var(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"), 10 * 1024 * 1024)?;

        // --- Load Storage Settings ---
        let backend = var("STORAGE_BACKEND")
            .unwrap_or_else(|| "supabase".to_string())
            .to_lowercase();
        let storage = match backend.as_str() {
            "local" => StorageConfig::Local {
                root: var("LOCAL_STORAGE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./uploads")),
                base_url: var("LOCAL_STORAGE_BASE_URL")
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
                url_secret: var("FILE_URL_SECRET"),
            },
            "supabase" => StorageConfig::Supabase {
                url: required("SUPABASE_URL")?,
                api_key: required("SUPABASE_ANON_KEY")?,
                bucket: required("SUPABASE_BUCKET")?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of 'local' or 'supabase'", other),
                ))
            }
        };

        // --- Load Application Settings ---
        let registration_role = match var("SELF_REGISTRATION_ROLE") {
            Some(raw) => raw.parse::<Role>().map_err(|e| {
                ConfigError::InvalidValue("SELF_REGISTRATION_ROLE".to_string(), e.to_string())
            })?,
            None => Role::Admin,
        };
        let signed_url_ttl = Duration::from_secs(parse_or(
            "SIGNED_URL_TTL_SECS",
            var("SIGNED_URL_TTL_SECS"),
            3600,
        )?);
        let session_ttl_days: i64 = parse_or("SESSION_TTL_DAYS", var("SESSION_TTL_DAYS"), 30)?;
        let session_ttl = (1..=MAX_SESSION_TTL_DAYS)
            .contains(&session_ttl_days)
            .then(|| chrono::Duration::try_days(session_ttl_days))
            .flatten()
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SESSION_TTL_DAYS".to_string(),
                    format!("must be between 1 and {} days", MAX_SESSION_TTL_DAYS),
                )
            })?;

        let defaults = PasswordHashing::default();
        let password_hashing = PasswordHashing {
            memory_kib: parse_or(
                "PASSWORD_HASH_MEMORY_KIB",
                var("PASSWORD_HASH_MEMORY_KIB"),
                defaults.memory_kib,
            )?,
            iterations: parse_or(
                "PASSWORD_HASH_ITERATIONS",
                var("PASSWORD_HASH_ITERATIONS"),
                defaults.iterations,
            )?,
            parallelism: parse_or(
                "PASSWORD_HASH_PARALLELISM",
                var("PASSWORD_HASH_PARALLELISM"),
                defaults.parallelism,
            )?,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            max_upload_bytes,
            storage,
            registration_role,
            signed_url_ttl,
            session_ttl,
            password_hashing,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
