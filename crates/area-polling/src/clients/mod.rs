// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP clients for the services the poller collaborates with.
//!
//! | Client | Trait | Endpoint |
//! |--------|-------|----------|
//! | [`HttpProviderConfigSource`] | [`ProviderConfigSource`] | `GET /polling/providers/config`, `GET /polling/providers` |
//! | [`HttpTokenProvider`] | [`TokenProvider`] | `GET /oauth2/provider/token/` |
//! | [`HttpTriggerSink`] | [`TriggerSink`] | `POST /triggerArea` |
//!
//! Internal services answer with an envelope `{success, data, error}` where
//! `error` is either a string or `{code, message}`.

pub mod providers;
pub mod tokens;
pub mod trigger;

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use providers::{HttpProviderConfigSource, ProviderConfigSource, ProviderError};
pub use tokens::{HttpTokenProvider, TokenProvider};
pub use trigger::{HttpTriggerSink, TriggerSink};

/// Header carrying the shared secret on internal calls.
pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

/// Timeout of calls to internal services.
pub const INTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from the token provider and trigger sink.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The call could not be completed.
    #[error("{context}: {source}")]
    Http {
        /// What was being attempted
        context: &'static str,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the expected JSON.
    #[error("{context}: {source}")]
    Decode {
        /// What was being decoded
        context: &'static str,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// The service answered with an error.
    #[error("{0}")]
    Remote(String),

    /// The token service answered without a token.
    #[error("provider token not found")]
    MissingToken,

    /// The trigger was called without a valid action id.
    #[error("action_id is required")]
    InvalidActionId,
}

/// Response envelope of internal services.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl<T: DeserializeOwned> Envelope<T> {
    pub(crate) fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Message from the `error` member, or `fallback` when there is none.
    pub(crate) fn error_message(&self, fallback: &str) -> String {
        let message = self.error.as_ref().map(remote_error_message).unwrap_or_default();
        if message.is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

/// Human-readable message of a remote error value.
///
/// A string is used as-is; an object uses `message`, falling back to
/// `code`; anything else is its raw JSON text. The result is trimmed.
pub fn remote_error_message(error: &Value) -> String {
    match error {
        Value::Null => String::new(),
        Value::String(message) => message.trim().to_string(),
        Value::Object(map) => {
            let field = |name: &str| {
                map.get(name)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or("")
                    .to_string()
            };
            let message = field("message");
            if message.is_empty() { field("code") } else { message }
        }
        other => other.to_string().trim().to_string(),
    }
}

/// Message of a non-envelope error body: JSON when it parses, raw text
/// otherwise.
pub(crate) fn raw_error_message(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => remote_error_message(&value),
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
