// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for area-polling integration tests.
//!
//! Provides in-memory collaborators and a TestContext wiring them to an
//! in-memory SQLite store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use area_dsl::ProviderConfig;
use area_engine::OutputField;
use async_trait::async_trait;
use serde_json::Value;

use area_polling::clients::{
    ClientError, ProviderConfigSource, ProviderError, TokenProvider, TriggerSink,
};
use area_polling::poller::{Poller, PollerConfig};
use area_polling::request::RequestExecutor;
use area_polling::store::{NewSubscription, SqliteSubscriptionStore, Subscription, SubscriptionStore};
use area_polling::subscriptions::SubscriptionService;

/// Provider configs registered by name.
#[derive(Default)]
pub struct StaticProviders {
    configs: Mutex<HashMap<String, Arc<ProviderConfig>>>,
}

impl StaticProviders {
    pub fn insert(&self, name: &str, config: Value) {
        let config: ProviderConfig =
            serde_json::from_value(config).expect("Invalid provider config");
        self.configs
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(config));
    }
}

#[async_trait]
impl ProviderConfigSource for StaticProviders {
    async fn get_config(&self, name: &str) -> Result<Arc<ProviderConfig>, ProviderError> {
        self.configs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    async fn list_names(&self) -> Result<Vec<String>, ProviderError> {
        let mut names: Vec<String> = self.configs.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Tokens of the form `token-<provider>-<user>`.
#[derive(Default)]
pub struct StaticTokens;

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn get_token(&self, user_id: i64, provider: &str) -> Result<String, ClientError> {
        Ok(format!("token-{}-{}", provider, user_id))
    }
}

/// Records every trigger; action ids listed in `failing` are rejected.
#[derive(Default)]
pub struct RecordingTrigger {
    pub calls: Mutex<Vec<(i64, Vec<OutputField>)>>,
    pub failing: Mutex<Vec<i64>>,
}

impl RecordingTrigger {
    pub fn calls(&self) -> Vec<(i64, Vec<OutputField>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Value of field `name` in every recorded call, in call order.
    pub fn values(&self, name: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|(_, fields)| {
                fields
                    .into_iter()
                    .find(|field| field.name == name)
                    .map(|field| field.value)
            })
            .collect()
    }
}

#[async_trait]
impl TriggerSink for RecordingTrigger {
    async fn trigger(&self, action_id: i64, fields: &[OutputField]) -> Result<(), ClientError> {
        self.calls
            .lock()
            .unwrap()
            .push((action_id, fields.to_vec()));
        if self.failing.lock().unwrap().contains(&action_id) {
            return Err(ClientError::Remote("area not found".to_string()));
        }
        Ok(())
    }
}

/// In-memory store plus recording collaborators.
pub struct TestContext {
    pub store: Arc<SqliteSubscriptionStore>,
    pub providers: Arc<StaticProviders>,
    pub trigger: Arc<RecordingTrigger>,
    pub executor: Arc<RequestExecutor>,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = Arc::new(
            SqliteSubscriptionStore::in_memory()
                .await
                .expect("Failed to create in-memory store"),
        );
        let executor = Arc::new(RequestExecutor::new(
            reqwest::Client::new(),
            Arc::new(StaticTokens),
        ));
        Self {
            store,
            providers: Arc::new(StaticProviders::default()),
            trigger: Arc::new(RecordingTrigger::default()),
            executor,
        }
    }

    pub fn poller(&self) -> Poller {
        Poller::new(
            self.store.clone(),
            self.providers.clone(),
            self.executor.clone(),
            self.trigger.clone(),
            PollerConfig::default(),
        )
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(
            self.store.clone(),
            self.providers.clone(),
            self.executor.clone(),
        )
    }

    /// Insert an active subscription that is due immediately.
    pub async fn subscribe(&self, action_id: i64, service: &str, config: Value) -> Subscription {
        self.store
            .create(&NewSubscription {
                user_id: 7,
                action_id,
                provider: service.to_string(),
                service: service.to_string(),
                active: true,
                config,
                interval_seconds: 60,
                next_run_at: None,
            })
            .await
            .expect("Failed to create subscription")
    }

    pub async fn reload(&self, action_id: i64) -> Subscription {
        self.store
            .find_by_action_id(action_id)
            .await
            .expect("Failed to load subscription")
            .expect("Subscription missing")
    }
}
