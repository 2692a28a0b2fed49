// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook route tests through the full router with `oneshot`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use pika_config::model::RefusalPolicy;
use pika_core::{OutboundMessage, Translation};
use pika_gateway::auth::SECRET_HEADER;
use pika_gateway::{GatewayState, WEBHOOK_PATH, drain, router};
use pika_security::Gate;
use pika_test_utils::TestHarness;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

const SECRET: &str = "hook-secret";
const TELEGRAM_PEER: &str = "149.154.167.220:443";

fn gate() -> Arc<Gate> {
    Arc::new(
        Gate::new(
            SECRET,
            vec![
                "149.154.160.0/20".parse().unwrap(),
                "91.108.4.0/22".parse().unwrap(),
            ],
            vec!["1001".into()],
        )
        .unwrap(),
    )
}

fn state(harness: &TestHarness, trust_forwarded_for: bool) -> GatewayState {
    GatewayState {
        gate: gate(),
        dispatcher: harness.dispatcher.clone(),
        channel: harness.channel.clone(),
        trust_forwarded_for,
        tasks: TaskTracker::new(),
    }
}

fn app(harness: &TestHarness, trust_forwarded_for: bool) -> Router {
    router(state(harness, trust_forwarded_for))
}

fn update(sender: u64, text: &str) -> String {
    update_from(serde_json::json!({ "id": sender, "is_bot": false, "first_name": "Ana" }), text)
}

fn update_from(from: serde_json::Value, text: &str) -> String {
    let sender = from["id"].clone();
    serde_json::json!({
        "update_id": 1,
        "message": {
            "message_id": 55,
            "date": 1700000000i64,
            "chat": { "id": sender, "type": "private", "first_name": "Ana" },
            "from": from,
            "text": text,
        },
    })
    .to_string()
}

fn webhook(body: String, secret: Option<&str>, peer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    let mut request = builder.body(Body::from(body)).unwrap();
    if let Some(peer) = peer {
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
    }
    request
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn first_reply(harness: &TestHarness) -> OutboundMessage {
    let sent = tokio::time::timeout(Duration::from_secs(5), harness.channel.wait_for_sent(1))
        .await
        .expect("no reply was sent");
    sent[0].clone()
}

#[tokio::test]
async fn health_needs_no_credentials() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = app(&harness, false)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn authorized_message_is_acknowledged_and_answered() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = app(&harness, false)
        .oneshot(webhook(update(1001, "/id"), Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"ok":true}"#);

    let reply = first_reply(&harness).await;
    assert_eq!(reply.conversation, "1001");
    assert_eq!(reply.reply_to.map(|id| id.0), Some("55".to_string()));
    assert_eq!(reply.text, "🆔 Tu ID de Telegram es: 1001");
}

#[tokio::test]
async fn transport_failures_are_401_with_empty_body() {
    let harness = TestHarness::builder().build().await.unwrap();
    let cases = [
        webhook(update(1001, "hola"), None, Some(TELEGRAM_PEER)),
        webhook(update(1001, "hola"), Some("wrong"), Some(TELEGRAM_PEER)),
        webhook(update(1001, "hola"), Some(SECRET), Some("8.8.8.8:5000")),
        webhook(update(1001, "hola"), Some(SECRET), None),
    ];

    for request in cases {
        let response = app(&harness, false).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.is_empty());
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.channel.sent_count().await, 0);
    assert_eq!(harness.translator.call_count().await, 0);
}

#[tokio::test]
async fn bad_secret_is_rejected_before_the_body_is_read() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = app(&harness, false)
        .oneshot(webhook("{not json".into(), Some("wrong"), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_after_authentication_is_400() {
    let harness = TestHarness::builder().build().await.unwrap();
    let response = app(&harness, false)
        .oneshot(webhook("{not json".into(), Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forwarded_origin_is_used_behind_a_trusted_proxy() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut request = webhook(update(1001, "/ayuda"), Some(SECRET), Some("10.0.0.2:40000"));
    request
        .headers_mut()
        .insert("x-forwarded-for", "91.108.4.20, 10.0.0.1".parse().unwrap());

    let response = app(&harness, true).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(first_reply(&harness).await.text.contains("/resumen"));
}

#[tokio::test]
async fn forwarded_header_is_ignored_without_trust() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut request = webhook(update(1001, "/ayuda"), Some(SECRET), Some("10.0.0.2:40000"));
    request
        .headers_mut()
        .insert("x-forwarded-for", "91.108.4.20".parse().unwrap());

    let response = app(&harness, false).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unlisted_sender_gets_generic_refusal_and_nothing_runs() {
    let harness = TestHarness::builder()
        .with_answers(vec![Ok(Translation::Statement {
            sql: "SELECT * FROM clients".into(),
            summary: "Listar".into(),
        })])
        .build()
        .await
        .unwrap();

    let response = app(&harness, false)
        .oneshot(webhook(update(666, "lista los clientes"), Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reply = first_reply(&harness).await;
    assert_eq!(reply.text, "⛔ No tienes permiso para usar este bot.");
    assert!(!reply.text.contains("666"));
    assert_eq!(harness.translator.call_count().await, 0);
    assert_eq!(harness.executor.call_count(), 0);
}

#[tokio::test]
async fn silent_policy_sends_nothing_to_unlisted_sender() {
    let harness = TestHarness::builder()
        .with_refusal_policy(RefusalPolicy::Silent)
        .build()
        .await
        .unwrap();

    let response = app(&harness, false)
        .oneshot(webhook(update(666, "hola"), Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.channel.sent_count().await, 0);
}

#[tokio::test]
async fn non_message_update_is_acknowledged() {
    let harness = TestHarness::builder().build().await.unwrap();
    // An update kind this bot does not subscribe to.
    let body = serde_json::json!({
        "update_id": 2,
        "business_connection_x": { "id": "abc" },
    })
    .to_string();

    let response = app(&harness, false)
        .oneshot(webhook(body, Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, r#"{"ok":true}"#);
}

#[tokio::test]
async fn listed_username_on_unlisted_id_is_refused() {
    let harness = TestHarness::builder().build().await.unwrap();
    // "1001" is the only listed identity; this account merely claims it as a username.
    let from = serde_json::json!({
        "id": 666, "is_bot": false, "first_name": "Mallory", "username": "1001",
    });

    let response = app(&harness, false)
        .oneshot(webhook(update_from(from, "/id"), Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reply = first_reply(&harness).await;
    assert_eq!(reply.text, "⛔ No tienes permiso para usar este bot.");
    assert_eq!(harness.translator.call_count().await, 0);
}

#[tokio::test]
async fn shutdown_drains_acknowledged_updates() {
    let harness = TestHarness::builder()
        .with_answers(vec![Ok(Translation::Statement {
            sql: "SELECT name FROM clients".into(),
            summary: "Listar".into(),
        })])
        .build()
        .await
        .unwrap();
    let state = state(&harness, false);
    let tasks = state.tasks.clone();

    let response = router(state)
        .oneshot(webhook(update(1001, "lista los clientes"), Some(SECRET), Some(TELEGRAM_PEER)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(drain(&tasks, Duration::from_secs(5)).await);
    assert!(tasks.is_closed());
    assert!(tasks.is_empty());
    assert_eq!(harness.channel.sent_count().await, 1);
    assert_eq!(harness.executor.call_count(), 1);
}
