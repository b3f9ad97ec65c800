// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Area Polling - Subscription Polling Service
//!
//! This crate runs the polling side of the automation platform. Each
//! subscription binds an automation action to a declarative provider
//! configuration; the service calls the provider on the subscription's
//! schedule, detects what is new since the stored cursor and triggers the
//! action once per new item.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────────────────┐
//! │   Service registry   │◄───────│             area-polling             │
//! │  (provider configs)  │        │  ┌────────────┐   ┌───────────────┐  │
//! └──────────────────────┘        │  │   Poller   │──►│    Request    │──┼──► Provider APIs
//! ┌──────────────────────┐        │  │ (per tick) │   │   Executor    │  │
//! │     Auth service     │◄───────│  └─────┬──────┘   └───────────────┘  │
//! │   (OAuth2 tokens)    │        │        │ area-engine                 │
//! └──────────────────────┘        │        ▼                             │
//! ┌──────────────────────┐        │  ┌────────────┐   ┌───────────────┐  │
//! │     Area service     │◄───────│  │  Trigger   │   │ Subscriptions │  │
//! │   (POST triggerArea) │        │  │    Sink    │   │   (lifecycle) │  │
//! └──────────────────────┘        │  └────────────┘   └───────────────┘  │
//!                                 └──────────────────┬───────────────────┘
//!                                                    ▼
//!                                  ┌───────────────────────────────────┐
//!                                  │       PostgreSQL / SQLite         │
//!                                  │     (polling_subscriptions)       │
//!                                  └───────────────────────────────────┘
//! ```
//!
//! # Subscription State
//!
//! | Column | Written by | Meaning |
//! |--------|------------|---------|
//! | `last_item_id` | poller | Encoded cursor set; kept on failure |
//! | `next_run_at` | poller, lifecycle | Next due time; `NULL` is due now |
//! | `last_polled_at` | poller | Time of the last poll, successful or not |
//! | `last_error` | poller | Error text of the last failed poll |
//!
//! Creating or reconfiguring a subscription resets the cursor, so the first
//! poll after a change follows the provider's `skip_first` setting again.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `AREA_POLLING_DATABASE_URL` | No | - | PostgreSQL or `sqlite:` URL |
//! | `DATABASE_URL` | No | - | Fallback if above not set |
//! | `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` | No | - | PostgreSQL URL parts when no URL is set |
//! | `AREA_POLLING_MAX_CONNECTIONS` | No | `10` | Database pool size |
//! | `POLLING_TICK_SECONDS` | No | `60` | Scheduler tick |
//! | `PROVIDER_REQUEST_TIMEOUT_SECONDS` | No | `8` | Provider request timeout |
//! | `LOG_PROVIDER_REQUESTS` | No | `false` | Log every provider request |
//! | `INTERNAL_SECRET` | No | - | Sent as `X-Internal-Secret` |
//! | `SERVICE_SERVICE_URL` | No | gateway | Service registry base URL |
//! | `AUTH_SERVICE_URL` | No | gateway | Auth service base URL |
//! | `AREA_SERVICE_URL` | No | gateway | Area service base URL |
//!
//! # Modules
//!
//! - [`clients`]: Service registry, auth service and area service clients
//! - [`config`]: Service configuration from environment variables
//! - [`error`]: Error types for polling operations
//! - [`poller`]: Scheduler loop and per-subscription poll
//! - [`prepare`]: Subscription config preparation steps
//! - [`request`]: Provider request execution
//! - [`runtime`]: Embeddable runtime
//! - [`store`]: Subscription persistence (PostgreSQL, SQLite)
//! - [`subscriptions`]: Subscription lifecycle

#![deny(missing_docs)]

/// Clients for the collaborating internal services.
pub mod clients;

/// Service configuration loaded from environment variables.
pub mod config;

/// Error types for polling operations.
pub mod error;

/// Subscription scheduler.
pub mod poller;

/// Subscription config preparation steps.
pub mod prepare;

/// Provider request execution.
pub mod request;

/// Embeddable runtime for area-polling.
pub mod runtime;

/// Subscription persistence.
pub mod store;

/// Subscription lifecycle operations.
pub mod subscriptions;

pub use config::Config;
pub use error::Error;
pub use poller::{Poller, PollerConfig, compute_next_run_at};
pub use runtime::PollingRuntime;
pub use subscriptions::{SubscriptionError, SubscriptionInput, SubscriptionService};
