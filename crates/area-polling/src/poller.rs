// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Subscription scheduler.
//!
//! One pass runs immediately at startup, then one per tick. A pass lists the
//! due subscriptions and polls them one after another:
//!
//! ```text
//! provider config -> request -> payload -> per source:
//!     extract -> filter -> detect -> cursor
//!     map + trigger new items (oldest first)
//! -> polling state (cursor, next_run_at, last_error, last_polled_at)
//! ```
//!
//! A failed poll keeps the stored cursor and records the error text; it is
//! retried on its next scheduled run. No subscription failure stops the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use area_dsl::{MAX_INTERVAL_SECONDS, ProviderConfig, TemplateContext};
use area_engine::{CursorSet, evaluate_source, map_item, parse_payload};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::clients::{ProviderConfigSource, TriggerSink};
use crate::config::DEFAULT_TICK_SECONDS;
use crate::error::{Error, Result};
use crate::request::RequestExecutor;
use crate::store::{PollingState, Subscription, SubscriptionStore};

/// Interval used when a subscription has none.
const FALLBACK_INTERVAL_SECONDS: i64 = 60;

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between passes
    pub tick: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(DEFAULT_TICK_SECONDS),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Subscriptions that were due
    pub due: usize,
    /// Polls that failed
    pub failed: usize,
}

/// Scheduler that polls due subscriptions as a background task.
pub struct Poller {
    store: Arc<dyn SubscriptionStore>,
    providers: Arc<dyn ProviderConfigSource>,
    executor: Arc<RequestExecutor>,
    trigger: Arc<dyn TriggerSink>,
    config: PollerConfig,
    shutdown: Arc<Notify>,
}

impl Poller {
    /// Create a poller over the given collaborators.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        providers: Arc<dyn ProviderConfigSource>,
        executor: Arc<RequestExecutor>,
        trigger: Arc<dyn TriggerSink>,
        config: PollerConfig,
    ) -> Self {
        Self {
            store,
            providers,
            executor,
            trigger,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the poll loop until shutdown is signalled.
    pub async fn run(self) {
        info!(tick_secs = self.config.tick.as_secs(), "Poller started");

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_due().await {
                        error!(error = %e, "Failed to list due subscriptions");
                    }
                }
            }
        }
    }

    /// Poll every subscription that is due now.
    pub async fn poll_due(&self) -> Result<PassSummary> {
        let due = self.store.list_due(Utc::now()).await?;
        if due.is_empty() {
            debug!("No subscriptions due");
            return Ok(PassSummary::default());
        }

        let mut summary = PassSummary {
            due: due.len(),
            failed: 0,
        };
        for subscription in &due {
            if let Err(e) = self.process_subscription(subscription).await {
                summary.failed += 1;
                error!(
                    action_id = subscription.action_id,
                    service = %subscription.service,
                    error = %e,
                    "Poll failed"
                );
            }
        }

        info!(due = summary.due, failed = summary.failed, "Poll pass finished");
        Ok(summary)
    }

    /// Poll one subscription and record the outcome.
    ///
    /// Inactive subscriptions are skipped without touching their state.
    pub async fn process_subscription(&self, sub: &Subscription) -> Result<()> {
        if !sub.active {
            debug!(action_id = sub.action_id, "Inactive subscription skipped");
            return Ok(());
        }

        let provider = match self.providers.get_config(&sub.service).await {
            Ok(provider) => provider,
            Err(e) => {
                let e = Error::from(e);
                self.finish_with_error(sub, sub.interval_seconds, &e).await?;
                return Err(e);
            }
        };

        let now = Utc::now();
        match self.poll(sub, &provider, now).await {
            Ok(cursor) => {
                let state = PollingState {
                    last_item_id: cursor,
                    next_run_at: compute_next_run_at(
                        sub.next_run_at,
                        provider.interval_seconds,
                        now,
                    ),
                    last_error: String::new(),
                    last_polled_at: now,
                };
                self.store.update_polling_state(sub.action_id, &state).await?;
                Ok(())
            }
            Err(e) => {
                self.finish_with_error(sub, provider.interval_seconds, &e).await?;
                Err(e)
            }
        }
    }

    /// Run one poll and return the encoded cursor set to store.
    async fn poll(
        &self,
        sub: &Subscription,
        provider: &ProviderConfig,
        now: DateTime<Utc>,
    ) -> Result<String> {
        provider.validate()?;
        if !sub.config.is_object() {
            return Err(Error::InvalidSubscriptionConfig);
        }

        let ctx = TemplateContext::new(sub.config.clone())
            .with_provider(sub.provider.as_str())
            .with_user_id(sub.user_id)
            .with_process_env();

        let body = self
            .executor
            .execute(
                &provider.request,
                &sub.provider,
                sub.user_id,
                &ctx,
                &BTreeMap::new(),
            )
            .await?;
        let payload = parse_payload(&body, provider.payload_format)?;

        let sources = provider.sources();
        let first_source = sources.first().map(|s| s.name.as_str()).unwrap_or("");
        let mut cursors = CursorSet::decode(
            sub.last_item_id.as_deref(),
            first_source,
            provider.uses_item_sources(),
        );
        let first_poll = provider.skip_first && cursors.is_empty() && sub.last_polled_at.is_none();

        for source in &sources {
            let outcome = evaluate_source(&payload, source, cursors.get(&source.name), &ctx, now)?;
            cursors.set(&source.name, outcome.cursor.encode()?);

            if first_poll {
                debug!(
                    action_id = sub.action_id,
                    source = %source.name,
                    seeded = outcome.new_items.len(),
                    "First poll seeded cursor"
                );
                continue;
            }

            for item in outcome.new_items.iter().rev() {
                let fields = match map_item(item, &source.mappings, &ctx) {
                    Ok(fields) => fields,
                    Err(e) => {
                        warn!(
                            action_id = sub.action_id,
                            source = %source.name,
                            error = %e,
                            "Item skipped"
                        );
                        continue;
                    }
                };
                if let Err(e) = self.trigger.trigger(sub.action_id, &fields).await {
                    warn!(action_id = sub.action_id, error = %e, "Trigger failed");
                }
            }
        }

        Ok(cursors.encode()?)
    }

    async fn finish_with_error(
        &self,
        sub: &Subscription,
        interval_seconds: i64,
        err: &Error,
    ) -> Result<()> {
        let now = Utc::now();
        let state = PollingState {
            last_item_id: sub.last_item_id.clone().unwrap_or_default(),
            next_run_at: compute_next_run_at(sub.next_run_at, interval_seconds, now),
            last_error: err.to_string(),
            last_polled_at: now,
        };
        self.store.update_polling_state(sub.action_id, &state).await?;
        Ok(())
    }
}

/// Next run time on the `previous` schedule, never before `now`.
///
/// Missed ticks are skipped rather than replayed. A non-positive interval
/// falls back to one minute; intervals are capped at
/// [`MAX_INTERVAL_SECONDS`].
pub fn compute_next_run_at(
    previous: Option<DateTime<Utc>>,
    interval_seconds: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let seconds = if interval_seconds <= 0 {
        FALLBACK_INTERVAL_SECONDS
    } else {
        interval_seconds.min(MAX_INTERVAL_SECONDS)
    };
    let interval = TimeDelta::seconds(seconds);
    let from_now = now.checked_add_signed(interval).unwrap_or(now);

    let Some(mut next) = previous.and_then(|p| p.checked_add_signed(interval)) else {
        return from_now;
    };
    if next < now {
        let behind = (now - next).num_seconds() / seconds;
        next = next
            .checked_add_signed(TimeDelta::seconds(behind * seconds))
            .unwrap_or(from_now);
        while next < now {
            next += interval;
        }
    }
    next
}
