// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Delivery of triggered items to the area service.

use area_engine::OutputField;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::{
    ClientError, INTERNAL_CALL_TIMEOUT, INTERNAL_SECRET_HEADER, raw_error_message, trim_base_url,
};

/// Receiver of the output fields of each new item.
#[async_trait]
pub trait TriggerSink: Send + Sync {
    /// Fire the automation bound to `action_id` with `fields`.
    async fn trigger(&self, action_id: i64, fields: &[OutputField]) -> Result<(), ClientError>;
}

/// [`TriggerSink`] posting to the area service.
pub struct HttpTriggerSink {
    client: reqwest::Client,
    base_url: String,
    internal_secret: String,
}

#[derive(Serialize)]
struct TriggerRequest<'a> {
    action_id: i64,
    output_fields: &'a [OutputField],
}

impl HttpTriggerSink {
    /// Create a sink for the area service at `base_url`.
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
impl TriggerSink for HttpTriggerSink {
    async fn trigger(&self, action_id: i64, fields: &[OutputField]) -> Result<(), ClientError> {
        if action_id <= 0 {
            return Err(ClientError::InvalidActionId);
        }

        let mut request = self
            .client
            .post(format!("{}/triggerArea", self.base_url))
            .json(&TriggerRequest {
                action_id,
                output_fields: fields,
            })
            .timeout(INTERNAL_CALL_TIMEOUT);
        if !self.internal_secret.is_empty() {
            request = request.header(INTERNAL_SECRET_HEADER, &self.internal_secret);
        }

        let response = request.send().await.map_err(|source| ClientError::Http {
            context: "trigger area",
            source,
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|source| ClientError::Http {
            context: "trigger area",
            source,
        })?;

        if !status.is_success() {
            let message = raw_error_message(&body);
            return Err(ClientError::Remote(if message.is_empty() {
                "failed to trigger area".to_string()
            } else {
                message
            }));
        }

        info!(action_id, status = status.as_u16(), "Area trigger sent");
        Ok(())
    }
}
