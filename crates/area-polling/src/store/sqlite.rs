// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite subscription store.
//!
//! Timestamps are bound from the process clock so every stored time shares
//! one text format and compares correctly in the due query.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::types::Json;

use super::{
    NewSubscription, PollingState, SELECT_COLUMNS, Subscription, SubscriptionStore, non_empty,
};

/// Embedded SQLite migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed [`SubscriptionStore`].
#[derive(Clone)]
pub struct SqliteSubscriptionStore {
    pool: SqlitePool,
}

impl SqliteSubscriptionStore {
    /// Create a store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a store backed by an in-memory database with migrations applied.
    ///
    /// A single connection is used so every query sees the same database.
    pub async fn in_memory() -> Result<Self, crate::error::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn create(&self, subscription: &NewSubscription) -> Result<Subscription, sqlx::Error> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO polling_subscriptions
                (user_id, action_id, provider, service, active, config, interval_seconds,
                 next_run_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(subscription.user_id)
            .bind(subscription.action_id)
            .bind(&subscription.provider)
            .bind(&subscription.service)
            .bind(subscription.active)
            .bind(Json(&subscription.config))
            .bind(subscription.interval_seconds)
            .bind(subscription.next_run_at)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_by_action_id(&self, action_id: i64) -> Result<Option<Subscription>, sqlx::Error> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM polling_subscriptions WHERE action_id = ?");
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(action_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM polling_subscriptions
            WHERE active = 1 AND (next_run_at IS NULL OR next_run_at <= ?)
            ORDER BY next_run_at ASC NULLS FIRST, created_at ASC
            "#
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_by_action_id(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE polling_subscriptions
            SET provider = ?, service = ?, active = ?, config = ?, interval_seconds = ?,
                last_item_id = ?, last_polled_at = ?, next_run_at = ?, last_error = ?,
                updated_at = ?
            WHERE action_id = ?
            RETURNING {SELECT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Subscription>(&sql)
            .bind(&subscription.provider)
            .bind(&subscription.service)
            .bind(subscription.active)
            .bind(Json(&subscription.config))
            .bind(subscription.interval_seconds)
            .bind(subscription.last_item_id.as_deref().and_then(non_empty))
            .bind(subscription.last_polled_at)
            .bind(subscription.next_run_at)
            .bind(subscription.last_error.as_deref().and_then(non_empty))
            .bind(Utc::now())
            .bind(subscription.action_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update_polling_state(
        &self,
        action_id: i64,
        state: &PollingState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE polling_subscriptions
            SET last_item_id = ?, last_polled_at = ?, next_run_at = ?, last_error = ?,
                updated_at = ?
            WHERE action_id = ?
            "#,
        )
        .bind(non_empty(&state.last_item_id))
        .bind(state.last_polled_at)
        .bind(state.next_run_at)
        .bind(non_empty(&state.last_error))
        .bind(Utc::now())
        .bind(action_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_by_action_id(&self, action_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM polling_subscriptions WHERE action_id = ?")
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::is_unique_violation;
    use chrono::Duration;
    use serde_json::json;

    async fn test_store() -> SqliteSubscriptionStore {
        SqliteSubscriptionStore::in_memory()
            .await
            .expect("Failed to create in-memory store")
    }

    fn new_subscription(action_id: i64) -> NewSubscription {
        NewSubscription {
            user_id: 1,
            action_id,
            provider: "github".to_string(),
            service: "github".to_string(),
            active: true,
            config: json!({"repo": "octo/hello"}),
            interval_seconds: 60,
            next_run_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = test_store().await;

        let created = store
            .create(&new_subscription(10))
            .await
            .expect("Failed to create subscription");
        assert_eq!(created.action_id, 10);
        assert!(created.active);
        assert_eq!(created.config, json!({"repo": "octo/hello"}));
        assert!(created.last_item_id.is_none());

        let found = store
            .find_by_action_id(10)
            .await
            .expect("Query should succeed")
            .expect("Subscription should exist");
        assert_eq!(found.id, created.id);
        assert_eq!(found.service, "github");

        assert!(store.find_by_action_id(11).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_action_is_unique_violation() {
        let store = test_store().await;
        store.create(&new_subscription(10)).await.unwrap();

        let err = store.create(&new_subscription(10)).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_list_due_filters_and_orders() {
        let store = test_store().await;
        let now = Utc::now();

        let mut later = new_subscription(1);
        later.next_run_at = Some(now - Duration::seconds(10));
        store.create(&later).await.unwrap();

        let mut earlier = new_subscription(2);
        earlier.next_run_at = Some(now - Duration::seconds(60));
        store.create(&earlier).await.unwrap();

        store.create(&new_subscription(3)).await.unwrap();

        let mut future = new_subscription(4);
        future.next_run_at = Some(now + Duration::seconds(60));
        store.create(&future).await.unwrap();

        let mut inactive = new_subscription(5);
        inactive.active = false;
        store.create(&inactive).await.unwrap();

        let due: Vec<i64> = store
            .list_due(now)
            .await
            .unwrap()
            .into_iter()
            .map(|sub| sub.action_id)
            .collect();
        assert_eq!(due, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_update_polling_state() {
        let store = test_store().await;
        store.create(&new_subscription(10)).await.unwrap();
        let now = Utc::now();

        store
            .update_polling_state(
                10,
                &PollingState {
                    last_item_id: "42".to_string(),
                    next_run_at: now + Duration::seconds(60),
                    last_error: String::new(),
                    last_polled_at: now,
                },
            )
            .await
            .unwrap();

        let sub = store.find_by_action_id(10).await.unwrap().unwrap();
        assert_eq!(sub.last_item_id.as_deref(), Some("42"));
        assert!(sub.last_error.is_none());
        assert_eq!(sub.last_polled_at, Some(now));
        assert!(store.list_due(now).await.unwrap().is_empty());

        store
            .update_polling_state(
                10,
                &PollingState {
                    last_item_id: String::new(),
                    next_run_at: now,
                    last_error: "boom".to_string(),
                    last_polled_at: now,
                },
            )
            .await
            .unwrap();
        let sub = store.find_by_action_id(10).await.unwrap().unwrap();
        assert!(sub.last_item_id.is_none());
        assert_eq!(sub.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = test_store().await;
        let mut sub = store.create(&new_subscription(10)).await.unwrap();

        sub.active = false;
        sub.config = json!({"repo": "octo/world"});
        sub.last_item_id = Some("5".to_string());
        let updated = store
            .update_by_action_id(&sub)
            .await
            .unwrap()
            .expect("Subscription should exist");
        assert!(!updated.active);
        assert_eq!(updated.config, json!({"repo": "octo/world"}));
        assert_eq!(updated.last_item_id.as_deref(), Some("5"));

        store.delete_by_action_id(10).await.unwrap();
        assert!(store.find_by_action_id(10).await.unwrap().is_none());
        assert!(store.update_by_action_id(&sub).await.unwrap().is_none());
    }
}
