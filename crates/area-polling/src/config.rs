// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the polling service.

use std::time::Duration;

/// Tick used when `POLLING_TICK_SECONDS` is unset, invalid or not positive.
pub const DEFAULT_TICK_SECONDS: u64 = 60;

/// Provider request timeout used when `PROVIDER_REQUEST_TIMEOUT_SECONDS` is unset.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 8;

/// Polling service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL; a `sqlite:` URL selects the SQLite store
    pub database_url: String,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// Shared secret sent to internal services as `X-Internal-Secret`
    pub internal_secret: String,
    /// Base URL of the service registry (provider configurations)
    pub service_service_url: String,
    /// Base URL of the auth service (provider tokens)
    pub auth_service_url: String,
    /// Base URL of the area service (trigger sink)
    pub area_service_url: String,
    /// Scheduler tick
    pub tick: Duration,
    /// Timeout of outbound provider requests
    pub request_timeout: Duration,
    /// Log every provider request with status and duration
    pub log_provider_requests: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("AREA_POLLING_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .unwrap_or_else(|_| database_url_from_parts());

        let max_connections = parse_var("AREA_POLLING_MAX_CONNECTIONS", 10u32)?;

        // Tick falls back silently; the loop must always run
        let tick_seconds = std::env::var("POLLING_TICK_SECONDS")
            .ok()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .map(|secs| secs as u64)
            .unwrap_or(DEFAULT_TICK_SECONDS);

        let request_timeout = parse_var(
            "PROVIDER_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        let log_provider_requests = match std::env::var("LOG_PROVIDER_REQUESTS") {
            Ok(raw) => parse_bool("LOG_PROVIDER_REQUESTS", &raw)?,
            Err(_) => false,
        };

        Ok(Self {
            database_url,
            max_connections,
            internal_secret: env_or("INTERNAL_SECRET", "").trim().to_string(),
            service_service_url: env_or(
                "SERVICE_SERVICE_URL",
                "http://gateway:8080/area_service_api",
            ),
            auth_service_url: env_or("AUTH_SERVICE_URL", "http://gateway:8080/area_auth_api"),
            area_service_url: env_or("AREA_SERVICE_URL", "http://gateway:8080/area_area_api"),
            tick: Duration::from_secs(tick_seconds),
            request_timeout: Duration::from_secs(request_timeout),
            log_provider_requests,
        })
    }

    /// Whether the database URL points at SQLite.
    pub fn uses_sqlite(&self) -> bool {
        self.database_url.starts_with("sqlite:")
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn database_url_from_parts() -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}",
        env_or("DB_USER", "postgres"),
        env_or("DB_PASSWORD", "postgres"),
        env_or("DB_HOST", "localhost"),
        env_or("DB_PORT", "5432"),
        env_or("DB_NAME", "polling_service_db"),
    )
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: raw.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric variable could not be parsed.
    #[error("Invalid number in {name}: {value:?}")]
    InvalidNumber {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
    /// A boolean variable could not be parsed.
    #[error("Invalid boolean in {name}: {value:?}")]
    InvalidBool {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}
