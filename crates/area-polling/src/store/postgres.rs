// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL subscription store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{
    NewSubscription, PollingState, SELECT_COLUMNS, Subscription, SubscriptionStore, non_empty,
};

/// Embedded PostgreSQL migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgres");

/// PostgreSQL-backed [`SubscriptionStore`].
#[derive(Clone)]
pub struct PostgresSubscriptionStore {
    pool: PgPool,
}

impl PostgresSubscriptionStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SubscriptionStore for PostgresSubscriptionStore {
    async fn create(&self, subscription: &NewSubscription) -> Result<Subscription, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO polling_subscriptions
                (user_id, action_id, provider, service, active, config, interval_seconds, next_run_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
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
            .fetch_one(&self.pool)
            .await
    }

    async fn find_by_action_id(&self, action_id: i64) -> Result<Option<Subscription>, sqlx::Error> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM polling_subscriptions WHERE action_id = $1");
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
            WHERE active = TRUE AND (next_run_at IS NULL OR next_run_at <= $1)
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
            SET provider = $1, service = $2, active = $3, config = $4, interval_seconds = $5,
                last_item_id = $6, last_polled_at = $7, next_run_at = $8, last_error = $9,
                updated_at = NOW()
            WHERE action_id = $10
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
            SET last_item_id = $1, last_polled_at = $2, next_run_at = $3, last_error = $4,
                updated_at = NOW()
            WHERE action_id = $5
            "#,
        )
        .bind(non_empty(&state.last_item_id))
        .bind(state.last_polled_at)
        .bind(state.next_run_at)
        .bind(non_empty(&state.last_error))
        .bind(action_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_by_action_id(&self, action_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM polling_subscriptions WHERE action_id = $1")
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
