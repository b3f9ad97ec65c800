// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Area Polling - Subscription Polling Service
//!
//! A background service responsible for:
//! - Polling external provider APIs for due subscriptions
//! - Detecting new or changed items per subscription cursor
//! - Delivering mapped items to the area service

use std::sync::Arc;
use tracing::{info, warn};

use area_polling::clients::{
    HttpProviderConfigSource, HttpTokenProvider, HttpTriggerSink, ProviderConfigSource,
};
use area_polling::config::Config;
use area_polling::runtime::PollingRuntime;
use area_polling::store::{PostgresSubscriptionStore, SqliteSubscriptionStore, SubscriptionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "area_polling=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        tick_secs = config.tick.as_secs(),
        request_timeout_secs = config.request_timeout.as_secs(),
        sqlite = config.uses_sqlite(),
        "Starting Area Polling"
    );

    // Connect to database and apply migrations
    let store: Arc<dyn SubscriptionStore> = if config.uses_sqlite() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        let store = SqliteSubscriptionStore::new(pool);
        store.migrate().await?;
        Arc::new(store)
    } else {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        let store = PostgresSubscriptionStore::new(pool);
        store.migrate().await?;
        Arc::new(store)
    };

    info!("Database schema verified");

    // Internal calls carry their own per-request timeout
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let providers = Arc::new(HttpProviderConfigSource::new(
        http.clone(),
        &config.service_service_url,
        &config.internal_secret,
    ));
    let tokens = Arc::new(HttpTokenProvider::new(
        http.clone(),
        &config.auth_service_url,
        &config.internal_secret,
    ));
    let trigger = Arc::new(HttpTriggerSink::new(
        http.clone(),
        &config.area_service_url,
        &config.internal_secret,
    ));

    match providers.list_names().await {
        Ok(names) => info!(providers = ?names, "Polling providers available"),
        Err(e) => warn!(error = %e, "Failed to list polling providers"),
    }

    // Start the runtime
    let runtime = PollingRuntime::builder()
        .config(&config)
        .store(store)
        .providers(providers)
        .tokens(tokens)
        .trigger(trigger)
        .http_client(http)
        .build()?
        .start()
        .await?;

    info!("Area Polling ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Graceful shutdown
    runtime.shutdown().await?;

    info!("Area Polling shut down");

    Ok(())
}
