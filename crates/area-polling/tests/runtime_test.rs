// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the embeddable runtime.

mod common;

use std::sync::Arc;
use std::time::Duration;

use area_polling::runtime::PollingRuntime;
use area_polling::subscriptions::SubscriptionInput;
use common::{RecordingTrigger, StaticProviders, StaticTokens, TestContext};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_build_requires_collaborators() {
    let err = PollingRuntime::builder().build().err().unwrap();
    assert!(err.to_string().contains("store is required"));

    let ctx = TestContext::new().await;
    let err = PollingRuntime::builder()
        .store(ctx.store.clone())
        .providers(Arc::new(StaticProviders::default()))
        .tokens(Arc::new(StaticTokens))
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("trigger is required"));
}

#[tokio::test]
async fn test_build_rejects_zero_tick() {
    let ctx = TestContext::new().await;
    let err = PollingRuntime::builder()
        .store(ctx.store.clone())
        .providers(ctx.providers.clone())
        .tokens(Arc::new(StaticTokens))
        .trigger(ctx.trigger.clone())
        .tick(Duration::ZERO)
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("tick must be positive"));
}

#[tokio::test]
async fn test_runtime_polls_created_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2}, {"id": 1}])))
        .mount(&server)
        .await;

    let ctx = TestContext::new().await;
    ctx.providers.insert(
        "tracker",
        json!({
            "name": "tracker",
            "interval_seconds": 60,
            "request": {"method": "GET", "url_template": format!("{}/issues", server.uri())},
            "item_id_path": "id",
            "mappings": [{"field_key": "issue_id", "json_path": "id", "type": "number"}]
        }),
    );
    let trigger = Arc::new(RecordingTrigger::default());

    let runtime = PollingRuntime::builder()
        .store(ctx.store.clone())
        .providers(ctx.providers.clone())
        .tokens(Arc::new(StaticTokens))
        .trigger(trigger.clone())
        .tick(Duration::from_millis(50))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap();
    assert!(runtime.is_running());

    runtime
        .subscriptions()
        .create(
            7,
            42,
            SubscriptionInput {
                service: "tracker".to_string(),
                active: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut polled = false;
    for _ in 0..100 {
        if ctx.reload(42).await.last_polled_at.is_some() {
            polled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(polled, "subscription was never polled");

    let stored = ctx.reload(42).await;
    assert_eq!(stored.last_item_id.as_deref(), Some("2"));
    assert_eq!(stored.last_error, None);
    assert_eq!(trigger.values("issue_id"), vec!["1", "2"]);

    runtime.shutdown().await.unwrap();
}
