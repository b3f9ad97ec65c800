// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider configuration lookup.

use std::collections::HashMap;
use std::sync::Arc;

use area_dsl::ProviderConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Envelope, INTERNAL_CALL_TIMEOUT, INTERNAL_SECRET_HEADER, trim_base_url};

/// Provider configuration lookup errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The registry does not know the provider.
    #[error("provider not found")]
    NotFound(String),

    /// The call could not be completed.
    #[error("{context}: {source}")]
    Http {
        /// What was being attempted
        context: &'static str,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The response or the configuration in it could not be decoded.
    #[error("{context}: {source}")]
    Decode {
        /// What was being decoded
        context: &'static str,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// The registry answered with an error.
    #[error("{0}")]
    Remote(String),
}

/// Source of provider configurations, looked up by service name.
#[async_trait]
pub trait ProviderConfigSource: Send + Sync {
    /// Configuration of the named provider.
    async fn get_config(&self, name: &str) -> Result<Arc<ProviderConfig>, ProviderError>;

    /// Names of every polling provider.
    async fn list_names(&self) -> Result<Vec<String>, ProviderError>;
}

/// [`ProviderConfigSource`] backed by the service registry.
///
/// Configurations are cached by name for the lifetime of the source; only
/// successful lookups are cached.
pub struct HttpProviderConfigSource {
    client: reqwest::Client,
    base_url: String,
    internal_secret: String,
    cache: RwLock<HashMap<String, Arc<ProviderConfig>>>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderList {
    #[serde(default)]
    providers: Vec<String>,
}

impl HttpProviderConfigSource {
    /// Create a source for the registry at `base_url`.
    pub fn new(
        client: reqwest::Client,
        base_url: impl AsRef<str>,
        internal_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url.as_ref()),
            internal_secret: internal_secret.into().trim().to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .timeout(INTERNAL_CALL_TIMEOUT);
        if self.internal_secret.is_empty() {
            request
        } else {
            request.header(INTERNAL_SECRET_HEADER, &self.internal_secret)
        }
    }

    async fn fetch_config(&self, name: &str) -> Result<ProviderConfig, ProviderError> {
        let response = self
            .get("/polling/providers/config")
            .query(&[("provider", name)])
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                context: "fetch provider config",
                source,
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| ProviderError::Http {
            context: "fetch provider config",
            source,
        })?;
        let envelope =
            Envelope::<Value>::parse(&body).map_err(|source| ProviderError::Decode {
                context: "decode provider config",
                source,
            })?;

        if status != StatusCode::OK || !envelope.success {
            let message = envelope.error_message("failed to fetch provider config");
            if status == StatusCode::NOT_FOUND && message.eq_ignore_ascii_case("provider not found")
            {
                return Err(ProviderError::NotFound(name.to_string()));
            }
            return Err(ProviderError::Remote(message));
        }

        let data = envelope
            .data
            .ok_or_else(|| ProviderError::Remote("provider config missing from response".into()))?;
        serde_json::from_value(data).map_err(|source| ProviderError::Decode {
            context: "decode provider config",
            source,
        })
    }
}

#[async_trait]
impl ProviderConfigSource for HttpProviderConfigSource {
    async fn get_config(&self, name: &str) -> Result<Arc<ProviderConfig>, ProviderError> {
        if let Some(config) = self.cache.read().await.get(name) {
            return Ok(config.clone());
        }

        let config = Arc::new(self.fetch_config(name).await?);
        debug!(provider = %name, "Provider config cached");
        self.cache
            .write()
            .await
            .insert(name.to_string(), config.clone());
        Ok(config)
    }

    async fn list_names(&self) -> Result<Vec<String>, ProviderError> {
        let response = self
            .get("/polling/providers")
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                context: "fetch providers",
                source,
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| ProviderError::Http {
            context: "fetch providers",
            source,
        })?;
        let envelope =
            Envelope::<ProviderList>::parse(&body).map_err(|source| ProviderError::Decode {
                context: "decode providers",
                source,
            })?;

        if status != StatusCode::OK || !envelope.success {
            return Err(ProviderError::Remote(
                envelope.error_message("failed to fetch providers"),
            ));
        }
        Ok(envelope.data.unwrap_or_default().providers)
    }
}
