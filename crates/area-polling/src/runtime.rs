// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for area-polling.
//!
//! [`PollingRuntime`] wires the collaborators together and runs the poller
//! as a background task of an existing tokio application.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use area_polling::clients::{HttpProviderConfigSource, HttpTokenProvider, HttpTriggerSink};
//! use area_polling::runtime::PollingRuntime;
//! use area_polling::store::SqliteSubscriptionStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = reqwest::Client::new();
//!     let store = Arc::new(SqliteSubscriptionStore::in_memory().await?);
//!
//!     let runtime = PollingRuntime::builder()
//!         .store(store)
//!         .providers(Arc::new(HttpProviderConfigSource::new(client.clone(), "http://services", "")))
//!         .tokens(Arc::new(HttpTokenProvider::new(client.clone(), "http://auth", "")))
//!         .trigger(Arc::new(HttpTriggerSink::new(client, "http://area", "")))
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... create subscriptions through runtime.subscriptions() ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clients::{ProviderConfigSource, TokenProvider, TriggerSink};
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_TICK_SECONDS};
use crate::poller::{Poller, PollerConfig};
use crate::request::RequestExecutor;
use crate::store::SubscriptionStore;
use crate::subscriptions::SubscriptionService;

/// Builder for creating a [`PollingRuntime`].
pub struct PollingRuntimeBuilder {
    store: Option<Arc<dyn SubscriptionStore>>,
    providers: Option<Arc<dyn ProviderConfigSource>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    trigger: Option<Arc<dyn TriggerSink>>,
    http_client: Option<reqwest::Client>,
    tick: Duration,
    request_timeout: Duration,
    log_provider_requests: bool,
}

impl Default for PollingRuntimeBuilder {
    fn default() -> Self {
        Self {
            store: None,
            providers: None,
            tokens: None,
            trigger: None,
            http_client: None,
            tick: Duration::from_secs(DEFAULT_TICK_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            log_provider_requests: false,
        }
    }
}

impl PollingRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the tick, request timeout and request logging of `config`.
    pub fn config(self, config: &Config) -> Self {
        self.tick(config.tick)
            .request_timeout(config.request_timeout)
            .log_provider_requests(config.log_provider_requests)
    }

    /// Set the subscription store (required).
    pub fn store(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the provider configuration source (required).
    pub fn providers(mut self, providers: Arc<dyn ProviderConfigSource>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Set the OAuth2 token provider (required).
    pub fn tokens(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Set the trigger sink (required).
    pub fn trigger(mut self, trigger: Arc<dyn TriggerSink>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Use `client` for provider requests instead of building one.
    ///
    /// The request timeout is not applied to a supplied client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the time between poll passes.
    ///
    /// Default: 60 seconds
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the timeout of provider requests.
    ///
    /// Default: 8 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Log every provider request at info level.
    ///
    /// Default: off
    pub fn log_provider_requests(mut self, enabled: bool) -> Self {
        self.log_provider_requests = enabled;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<PollingRuntimeConfig> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let providers = self
            .providers
            .ok_or_else(|| anyhow::anyhow!("providers is required"))?;
        let tokens = self
            .tokens
            .ok_or_else(|| anyhow::anyhow!("tokens is required"))?;
        let trigger = self
            .trigger
            .ok_or_else(|| anyhow::anyhow!("trigger is required"))?;
        if self.tick.is_zero() {
            anyhow::bail!("tick must be positive");
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.request_timeout)
                .build()?,
        };

        Ok(PollingRuntimeConfig {
            store,
            providers,
            tokens,
            trigger,
            http_client,
            tick: self.tick,
            log_provider_requests: self.log_provider_requests,
        })
    }
}

/// Configuration for a [`PollingRuntime`].
pub struct PollingRuntimeConfig {
    store: Arc<dyn SubscriptionStore>,
    providers: Arc<dyn ProviderConfigSource>,
    tokens: Arc<dyn TokenProvider>,
    trigger: Arc<dyn TriggerSink>,
    http_client: reqwest::Client,
    tick: Duration,
    log_provider_requests: bool,
}

impl PollingRuntimeConfig {
    /// Start the runtime, spawning the poller task.
    pub async fn start(self) -> Result<PollingRuntime> {
        let executor = Arc::new(
            RequestExecutor::new(self.http_client, self.tokens)
                .with_request_logging(self.log_provider_requests),
        );

        let subscriptions = Arc::new(SubscriptionService::new(
            self.store.clone(),
            self.providers.clone(),
            executor.clone(),
        ));

        let poller = Poller::new(
            self.store,
            self.providers,
            executor,
            self.trigger,
            PollerConfig { tick: self.tick },
        );
        let poller_shutdown = poller.shutdown_handle();

        let poller_handle = tokio::spawn(async move {
            poller.run().await;
        });

        info!(tick_secs = self.tick.as_secs(), "PollingRuntime started");

        Ok(PollingRuntime {
            poller_handle,
            poller_shutdown,
            subscriptions,
        })
    }
}

/// A running poller that can be embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct PollingRuntime {
    poller_handle: JoinHandle<()>,
    poller_shutdown: Arc<Notify>,
    subscriptions: Arc<SubscriptionService>,
}

impl PollingRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> PollingRuntimeBuilder {
        PollingRuntimeBuilder::new()
    }

    /// Subscription lifecycle operations sharing the runtime's collaborators.
    pub fn subscriptions(&self) -> &Arc<SubscriptionService> {
        &self.subscriptions
    }

    /// Gracefully shut down the runtime.
    ///
    /// A poll pass in progress is finished before the task exits.
    pub async fn shutdown(self) -> Result<()> {
        info!("PollingRuntime shutting down...");

        self.poller_shutdown.notify_one();

        if let Err(e) = self.poller_handle.await {
            error!("Poller task panicked: {}", e);
            return Err(anyhow::anyhow!("poller task panicked: {}", e));
        }

        info!("PollingRuntime shutdown complete");
        Ok(())
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.poller_handle.is_finished()
    }
}
