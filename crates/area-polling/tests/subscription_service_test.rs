// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the subscription lifecycle service.

mod common;

use area_polling::store::{PollingState, SubscriptionStore};
use area_polling::subscriptions::{SubscriptionError, SubscriptionInput};
use chrono::Utc;
use common::TestContext;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn calendar_provider(server: &MockServer) -> Value {
    json!({
        "name": "google_calendar",
        "interval_seconds": 900,
        "request": {"method": "GET", "url_template": "https://calendar.example.com/{{config.calendar_id}}"},
        "prepare": [
            {
                "when": {"json_path": "config.calendar_id", "exists": false},
                "fetch": {
                    "method": "GET",
                    "url_template": format!("{}/users/me/calendarList", server.uri()),
                    "auth": {"type": "oauth2", "prefix": "Bearer ", "provider": "google"},
                    "response_json_path": "items",
                    "item_json_path": "id",
                    "store_path": "config.calendars"
                }
            },
            {"generate": {"store_path": "channel_token", "only_if_missing": true}}
        ]
    })
}

fn input(service: &str, config: Value, active: bool) -> SubscriptionInput {
    SubscriptionInput {
        provider: String::new(),
        service: service.to_string(),
        config,
        active,
    }
}

async fn mount_calendar_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header("Authorization", "Bearer token-google-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "primary"}, {"id": "team@example.com"}]
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_runs_prepare_and_schedules() {
    let server = MockServer::start().await;
    mount_calendar_list(&server).await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));

    let before = Utc::now();
    let created = ctx
        .subscriptions()
        .create(7, 10, input("google_calendar", Value::Null, true))
        .await
        .unwrap();

    assert_eq!(created.user_id, 7);
    assert_eq!(created.provider, "google_calendar");
    assert_eq!(created.service, "google_calendar");
    assert_eq!(created.interval_seconds, 900);
    assert!(created.active);
    assert!(created.next_run_at.unwrap() >= before);
    assert_eq!(created.config["calendars"], json!(["primary", "team@example.com"]));
    assert_eq!(created.config["channel_token"].as_str().unwrap().len(), 32);

    let stored = ctx.reload(10).await;
    assert_eq!(stored.config, created.config);
}

#[tokio::test]
async fn test_create_inactive_is_not_scheduled() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));

    let created = ctx
        .subscriptions()
        .create(
            7,
            10,
            SubscriptionInput {
                provider: " gcal ".to_string(),
                service: " google_calendar ".to_string(),
                config: json!({"calendar_id": "primary"}),
                active: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(created.provider, "gcal");
    assert_eq!(created.service, "google_calendar");
    assert_eq!(created.next_run_at, None);
    assert!(ctx.store.list_due(Utc::now()).await.unwrap().is_empty());
    // Condition skipped the fetch
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_create_service_falls_back_to_provider() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));

    let created = ctx
        .subscriptions()
        .create(
            7,
            10,
            SubscriptionInput {
                provider: "google_calendar".to_string(),
                service: String::new(),
                config: json!({"calendar_id": "primary"}),
                active: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.service, "google_calendar");
}

#[tokio::test]
async fn test_create_rejections() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));
    ctx.providers.insert(
        "broken",
        json!({
            "name": "broken",
            "interval_seconds": 0,
            "request": {"method": "GET", "url_template": "https://example.com"}
        }),
    );
    let service = ctx.subscriptions();

    assert!(matches!(
        service.create(7, 1, input("", Value::Null, true)).await,
        Err(SubscriptionError::ProviderNotSupported)
    ));
    assert!(matches!(
        service.create(7, 1, input("unknown", Value::Null, true)).await,
        Err(SubscriptionError::ProviderNotSupported)
    ));
    assert!(matches!(
        service.create(7, 1, input("broken", Value::Null, true)).await,
        Err(SubscriptionError::InvalidConfig(_))
    ));
    assert!(matches!(
        service
            .create(7, 1, input("google_calendar", json!("primary"), true))
            .await,
        Err(SubscriptionError::InvalidConfig(_))
    ));

    service
        .create(7, 1, input("google_calendar", json!({"calendar_id": "a"}), true))
        .await
        .unwrap();
    assert!(matches!(
        service
            .create(8, 1, input("google_calendar", json!({"calendar_id": "b"}), true))
            .await,
        Err(SubscriptionError::ActionExists)
    ));
}

#[tokio::test]
async fn test_create_prepare_failure_is_invalid_config() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));

    let err = ctx
        .subscriptions()
        .create(7, 10, input("google_calendar", json!({}), true))
        .await
        .unwrap_err();
    assert!(matches!(&err, SubscriptionError::InvalidConfig(message) if message.contains("401")));
    assert!(ctx.store.find_by_action_id(10).await.unwrap().is_none());
}

// ============================================================================
// Update, toggle, delete
// ============================================================================

#[tokio::test]
async fn test_update_resets_polling_state() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));
    let service = ctx.subscriptions();

    let created = service
        .create(7, 10, input("google_calendar", json!({"calendar_id": "a"}), true))
        .await
        .unwrap();
    let token = created.config["channel_token"].clone();

    ctx.store
        .update_polling_state(
            10,
            &PollingState {
                last_item_id: "cursor".to_string(),
                next_run_at: Utc::now(),
                last_error: "boom".to_string(),
                last_polled_at: Utc::now(),
            },
        )
        .await
        .unwrap();

    let updated = service
        .update(
            7,
            10,
            input(
                "google_calendar",
                json!({"calendar_id": "b", "channel_token": token}),
                false,
            ),
        )
        .await
        .unwrap();

    assert_eq!(updated.config["calendar_id"], json!("b"));
    assert_eq!(updated.config["channel_token"], token);
    assert!(!updated.active);
    assert_eq!(updated.last_item_id, None);
    assert_eq!(updated.last_error, None);
    assert_eq!(updated.last_polled_at, None);
    assert_eq!(updated.next_run_at, None);
    assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn test_update_ownership_and_missing() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));
    let service = ctx.subscriptions();

    assert!(matches!(
        service
            .update(7, 10, input("google_calendar", json!({}), true))
            .await,
        Err(SubscriptionError::NotFound)
    ));

    service
        .create(7, 10, input("google_calendar", json!({"calendar_id": "a"}), true))
        .await
        .unwrap();
    assert!(matches!(
        service
            .update(8, 10, input("google_calendar", json!({"calendar_id": "b"}), true))
            .await,
        Err(SubscriptionError::Unauthorized)
    ));
    assert!(matches!(
        service.deactivate(8, 10).await,
        Err(SubscriptionError::Unauthorized)
    ));
    assert!(matches!(
        service.activate(7, 99).await,
        Err(SubscriptionError::NotFound)
    ));
}

#[tokio::test]
async fn test_activate_and_deactivate() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));
    let service = ctx.subscriptions();

    service
        .create(7, 10, input("google_calendar", json!({"calendar_id": "a"}), true))
        .await
        .unwrap();

    let paused = service.deactivate(7, 10).await.unwrap();
    assert!(!paused.active);
    assert_eq!(paused.next_run_at, None);
    assert!(ctx.store.list_due(Utc::now()).await.unwrap().is_empty());

    let resumed = service.activate(7, 10).await.unwrap();
    assert!(resumed.active);
    assert!(resumed.next_run_at.is_some());
    assert_eq!(ctx.store.list_due(Utc::now()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_and_delete() {
    let server = MockServer::start().await;
    let ctx = TestContext::new().await;
    ctx.providers.insert("google_calendar", calendar_provider(&server));
    let service = ctx.subscriptions();

    assert!(service.get(10).await.unwrap().is_none());
    service
        .create(7, 10, input("google_calendar", json!({"calendar_id": "a"}), true))
        .await
        .unwrap();
    assert_eq!(service.get(10).await.unwrap().unwrap().action_id, 10);

    service.delete(10).await.unwrap();
    assert!(service.get(10).await.unwrap().is_none());
    service.delete(10).await.unwrap();
}
