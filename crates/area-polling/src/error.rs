// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the polling service.

use thiserror::Error;

/// Polling service errors.
///
/// The display text of a failed poll is what ends up in a subscription's
/// `last_error` column.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider configuration lookup failed.
    #[error("{0}")]
    Provider(#[from] crate::clients::ProviderError),

    /// Provider configuration failed validation.
    #[error("{0}")]
    InvalidProvider(#[from] area_dsl::ConfigError),

    /// The provider request failed.
    #[error("{0}")]
    Request(#[from] crate::request::RequestError),

    /// The response body could not be parsed.
    #[error("{0}")]
    Payload(#[from] area_engine::PayloadError),

    /// Item extraction or change detection failed.
    #[error("{0}")]
    Engine(#[from] area_engine::EngineError),

    /// The stored subscription config is not a JSON object.
    #[error("invalid subscription config")]
    InvalidSubscriptionConfig,
}

/// Result type using the polling service Error.
pub type Result<T> = std::result::Result<T, Error>;
