// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subscription persistence.
//!
//! The [`SubscriptionStore`] trait is implemented for PostgreSQL and SQLite.
//! Both backends keep a single `polling_subscriptions` table with a unique
//! `action_id` and an index on `(active, next_run_at)` for the due query.

pub mod postgres;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use postgres::PostgresSubscriptionStore;
pub use sqlite::SqliteSubscriptionStore;

/// One user's binding of an automation action to a polling provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    /// Row id
    pub id: i64,
    /// Owner of the action
    pub user_id: i64,
    /// Automation action; unique across subscriptions
    pub action_id: i64,
    /// Provider name used for templates and tokens
    pub provider: String,
    /// Service name used to look up the provider configuration
    pub service: String,
    /// Only active subscriptions are polled
    pub active: bool,
    /// Subscription configuration (JSON object)
    #[sqlx(json)]
    pub config: Value,
    /// Polling interval copied from the provider when (re)configured
    pub interval_seconds: i64,
    /// Opaque cursor text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_item_id: Option<String>,
    /// Time of the last poll, successful or not
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Next scheduled poll; unset polls on the next tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    /// Error text of the last failed poll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Fields of a subscription about to be inserted.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub user_id: i64,
    pub action_id: i64,
    pub provider: String,
    pub service: String,
    pub active: bool,
    pub config: Value,
    pub interval_seconds: i64,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Outcome of one poll, written in a single update.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingState {
    /// Encoded cursor; empty is stored as NULL
    pub last_item_id: String,
    /// Next scheduled poll
    pub next_run_at: DateTime<Utc>,
    /// Error text; empty is stored as NULL
    pub last_error: String,
    /// Time of this poll
    pub last_polled_at: DateTime<Utc>,
}

/// Subscription persistence operations.
#[allow(missing_docs)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a subscription and return the stored row.
    async fn create(&self, subscription: &NewSubscription) -> Result<Subscription, sqlx::Error>;

    async fn find_by_action_id(&self, action_id: i64) -> Result<Option<Subscription>, sqlx::Error>;

    /// Active subscriptions whose `next_run_at` is unset or not after `now`,
    /// never-scheduled ones first, then by `next_run_at` and creation time.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, sqlx::Error>;

    /// Overwrite the mutable fields of the subscription with the same
    /// action id. Returns `None` when it no longer exists.
    async fn update_by_action_id(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    async fn update_polling_state(
        &self,
        action_id: i64,
        state: &PollingState,
    ) -> Result<(), sqlx::Error>;

    async fn delete_by_action_id(&self, action_id: i64) -> Result<(), sqlx::Error>;
}

/// Whether a store error is a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

const SELECT_COLUMNS: &str = "id, user_id, action_id, provider, service, active, config, \
     interval_seconds, last_item_id, last_polled_at, next_run_at, last_error, created_at, updated_at";
