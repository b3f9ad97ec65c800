// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider access tokens.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ClientError, Envelope, INTERNAL_CALL_TIMEOUT, INTERNAL_SECRET_HEADER, trim_base_url};

/// Source of OAuth2 access tokens for a user's provider account.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current access token of `user_id` for `provider`.
    async fn get_token(&self, user_id: i64, provider: &str) -> Result<String, ClientError>;
}

/// [`TokenProvider`] backed by the auth service.
pub struct HttpTokenProvider {
    client: reqwest::Client,
    base_url: String,
    internal_secret: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderToken {
    #[serde(rename = "providerToken", default)]
    provider_token: String,
}

impl HttpTokenProvider {
    /// Create a provider for the auth service at `base_url`.
    pub fn new(
        client: reqwest::Client,
        base_url: impl AsRef<str>,
        internal_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: trim_base_url(base_url.as_ref()),
            internal_secret: internal_secret.into().trim().to_string(),
        }
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn get_token(&self, user_id: i64, provider: &str) -> Result<String, ClientError> {
        let mut request = self
            .client
            .get(format!("{}/oauth2/provider/token/", self.base_url))
            .query(&[("user_id", user_id.to_string().as_str()), ("service", provider)])
            .timeout(INTERNAL_CALL_TIMEOUT);
        if !self.internal_secret.is_empty() {
            request = request.header(INTERNAL_SECRET_HEADER, &self.internal_secret);
        }

        let response = request.send().await.map_err(|source| ClientError::Http {
            context: "fetch provider token",
            source,
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|source| ClientError::Http {
            context: "fetch provider token",
            source,
        })?;
        let envelope =
            Envelope::<ProviderToken>::parse(&body).map_err(|source| ClientError::Decode {
                context: "decode provider token",
                source,
            })?;

        if status != StatusCode::OK || !envelope.success {
            return Err(ClientError::Remote(
                envelope.error_message("failed to fetch provider token"),
            ));
        }

        let token = envelope.data.unwrap_or_default().provider_token;
        if token.is_empty() {
            return Err(ClientError::MissingToken);
        }
        Ok(token)
    }
}
