// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subscription lifecycle.
//!
//! [`SubscriptionService`] creates, reconfigures and toggles the polling
//! subscription bound to an automation action. Every (re)configuration
//! resolves the provider, validates it, runs its prepare steps and schedules
//! the subscription for the next tick when active.

use std::sync::Arc;

use area_dsl::ProviderConfig;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::clients::{ProviderConfigSource, ProviderError};
use crate::prepare::apply_prepare_steps;
use crate::request::RequestExecutor;
use crate::store::{NewSubscription, Subscription, SubscriptionStore, is_unique_violation};

/// Subscription lifecycle errors.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The action already has a subscription.
    #[error("action already has a subscription")]
    ActionExists,

    /// No provider matches the requested service.
    #[error("provider not supported")]
    ProviderNotSupported,

    /// The provider or subscription config was rejected.
    #[error("invalid subscription config: {0}")]
    InvalidConfig(String),

    /// No subscription exists for the action.
    #[error("subscription not found")]
    NotFound,

    /// The action belongs to another user.
    #[error("action does not belong to user")]
    Unauthorized,

    /// The provider registry could not be queried.
    #[error(transparent)]
    Provider(ProviderError),

    /// Store operation failed.
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Requested subscription settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionInput {
    /// Provider name for templates and tokens; the service name when blank
    #[serde(default)]
    pub provider: String,
    /// Service whose provider configuration drives polling; the provider
    /// name when blank
    #[serde(default)]
    pub service: String,
    /// Subscription config; `null` is treated as an empty object
    #[serde(default)]
    pub config: Value,
    /// Whether the subscription is polled
    #[serde(default)]
    pub active: bool,
}

/// Resolved and prepared settings ready to persist.
struct Resolved {
    provider: String,
    service: String,
    config: Value,
    interval_seconds: i64,
}

/// Manages subscriptions on behalf of the automation API.
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
    providers: Arc<dyn ProviderConfigSource>,
    executor: Arc<RequestExecutor>,
}

impl SubscriptionService {
    /// Create a service over the given collaborators.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        providers: Arc<dyn ProviderConfigSource>,
        executor: Arc<RequestExecutor>,
    ) -> Self {
        Self {
            store,
            providers,
            executor,
        }
    }

    /// Bind a new subscription to `action_id`.
    pub async fn create(
        &self,
        user_id: i64,
        action_id: i64,
        input: SubscriptionInput,
    ) -> Result<Subscription, SubscriptionError> {
        if self.store.find_by_action_id(action_id).await?.is_some() {
            return Err(SubscriptionError::ActionExists);
        }

        let resolved = self.resolve(user_id, input.provider, input.service, input.config).await?;
        let subscription = NewSubscription {
            user_id,
            action_id,
            provider: resolved.provider,
            service: resolved.service,
            active: input.active,
            config: resolved.config,
            interval_seconds: resolved.interval_seconds,
            next_run_at: input.active.then(Utc::now),
        };

        let created = self.store.create(&subscription).await.map_err(|e| {
            if is_unique_violation(&e) {
                SubscriptionError::ActionExists
            } else {
                SubscriptionError::Store(e)
            }
        })?;
        info!(
            action_id,
            user_id,
            service = %created.service,
            active = created.active,
            "Subscription created"
        );
        Ok(created)
    }

    /// Subscription bound to `action_id`, if any.
    pub async fn get(&self, action_id: i64) -> Result<Option<Subscription>, SubscriptionError> {
        Ok(self.store.find_by_action_id(action_id).await?)
    }

    /// Reconfigure the subscription of `action_id`. The cursor, last error
    /// and last poll time are reset.
    pub async fn update(
        &self,
        user_id: i64,
        action_id: i64,
        input: SubscriptionInput,
    ) -> Result<Subscription, SubscriptionError> {
        let existing = self.owned(user_id, action_id).await?;
        let resolved = self.resolve(user_id, input.provider, input.service, input.config).await?;

        let subscription = Subscription {
            provider: resolved.provider,
            service: resolved.service,
            active: input.active,
            config: resolved.config,
            interval_seconds: resolved.interval_seconds,
            last_item_id: None,
            last_polled_at: None,
            last_error: None,
            next_run_at: input.active.then(Utc::now),
            ..existing
        };

        let saved = self
            .store
            .update_by_action_id(&subscription)
            .await?
            .ok_or(SubscriptionError::NotFound)?;
        info!(action_id, user_id, service = %saved.service, "Subscription updated");
        Ok(saved)
    }

    /// Remove the subscription of `action_id`. Removing a missing one is
    /// not an error.
    pub async fn delete(&self, action_id: i64) -> Result<(), SubscriptionError> {
        self.store.delete_by_action_id(action_id).await?;
        info!(action_id, "Subscription deleted");
        Ok(())
    }

    /// Resume polling; the subscription is due on the next tick.
    pub async fn activate(
        &self,
        user_id: i64,
        action_id: i64,
    ) -> Result<Subscription, SubscriptionError> {
        self.set_active(user_id, action_id, true).await
    }

    /// Stop polling.
    pub async fn deactivate(
        &self,
        user_id: i64,
        action_id: i64,
    ) -> Result<Subscription, SubscriptionError> {
        self.set_active(user_id, action_id, false).await
    }

    async fn set_active(
        &self,
        user_id: i64,
        action_id: i64,
        active: bool,
    ) -> Result<Subscription, SubscriptionError> {
        let existing = self.owned(user_id, action_id).await?;
        let subscription = Subscription {
            active,
            next_run_at: active.then(Utc::now),
            ..existing
        };

        let saved = self
            .store
            .update_by_action_id(&subscription)
            .await?
            .ok_or(SubscriptionError::NotFound)?;
        info!(action_id, active, "Subscription toggled");
        Ok(saved)
    }

    async fn owned(&self, user_id: i64, action_id: i64) -> Result<Subscription, SubscriptionError> {
        let subscription = self
            .store
            .find_by_action_id(action_id)
            .await?
            .ok_or(SubscriptionError::NotFound)?;
        if subscription.user_id != user_id {
            return Err(SubscriptionError::Unauthorized);
        }
        Ok(subscription)
    }

    async fn resolve(
        &self,
        user_id: i64,
        provider: String,
        service: String,
        config: Value,
    ) -> Result<Resolved, SubscriptionError> {
        let service = match service.trim() {
            "" => provider.trim().to_string(),
            trimmed => trimmed.to_string(),
        };
        if service.is_empty() {
            return Err(SubscriptionError::ProviderNotSupported);
        }
        let provider = match provider.trim() {
            "" => service.clone(),
            trimmed => trimmed.to_string(),
        };

        let provider_config = self.provider_config(&service).await?;
        provider_config
            .validate()
            .map_err(|e| SubscriptionError::InvalidConfig(e.to_string()))?;

        let mut config = match config {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            _ => {
                return Err(SubscriptionError::InvalidConfig(
                    "config must be a JSON object".to_string(),
                ));
            }
        };

        apply_prepare_steps(&self.executor, &provider_config, &provider, user_id, &mut config)
            .await
            .map_err(|e| SubscriptionError::InvalidConfig(e.to_string()))?;
        debug!(service = %service, steps = provider_config.prepare.len(), "Subscription config prepared");

        Ok(Resolved {
            provider,
            service,
            config,
            interval_seconds: provider_config.interval_seconds,
        })
    }

    async fn provider_config(&self, service: &str) -> Result<Arc<ProviderConfig>, SubscriptionError> {
        self.providers.get_config(service).await.map_err(|e| match e {
            ProviderError::NotFound(_) => SubscriptionError::ProviderNotSupported,
            ProviderError::Decode { .. } => SubscriptionError::InvalidConfig(e.to_string()),
            other => SubscriptionError::Provider(other),
        })
    }
}
