// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios for the complete message-to-mutation pipeline.
//!
//! Each test builds an isolated environment with a temp SQLite store.
//! Scenarios are independent and order-insensitive.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use pika_agent::{Dispatcher, DispatcherSettings, PendingState, SessionStore};
use pika_config::model::OpenAiConfig;
use pika_core::{SenderId, Translation};
use pika_gateway::{GatewayState, WEBHOOK_PATH};
use pika_openai::OpenAiTranslator;
use pika_security::Gate;
use pika_storage::{Database, SqliteExecutor};
use pika_test_utils::{TestHarness, inbound};
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DENIAL: &str = "🚫 Esa operación no está permitida.";

fn statement(sql: &str, summary: &str) -> Result<Translation, pika_core::TranslationError> {
    Ok(Translation::Statement {
        sql: sql.into(),
        summary: summary.into(),
    })
}

// ---- Scenario A: natural-language insert ----

#[tokio::test]
async fn scenario_a_client_insert_is_confirmed_and_committed() {
    let harness = TestHarness::builder()
        .with_answers(vec![statement(
            "INSERT INTO clients (name, phone, source_client_id) VALUES ('Juan','3001234567','src_juan_300');",
            "Agregar cliente Juan (3001234567)",
        )])
        .build()
        .await
        .unwrap();

    let prompt = harness
        .send("Agregar cliente Juan, tel 3001234567")
        .await
        .unwrap();
    assert!(prompt.contains("Agregar cliente Juan (3001234567)"));

    let reply = harness.send("sí").await.unwrap();
    assert_eq!(reply, "✅ Agregar cliente Juan (3001234567)\nFilas afectadas: 1");
    assert_eq!(
        harness
            .count("SELECT COUNT(*) FROM clients WHERE source_client_id = 'src_juan_300' AND phone = '3001234567'")
            .await,
        1
    );
}

// ---- Scenario B: destructive candidate ----

#[tokio::test]
async fn scenario_b_drop_table_is_denied_without_execution() {
    let harness = TestHarness::builder()
        .with_answers(vec![statement("DROP TABLE clients;", "Borrar la tabla")])
        .without_confirmation()
        .build()
        .await
        .unwrap();

    let reply = harness.send("lo que sea").await.unwrap();

    assert_eq!(reply, DENIAL);
    assert_eq!(harness.executor.call_count(), 0);
    // The table is still there.
    assert_eq!(harness.count("SELECT COUNT(*) FROM clients").await, 0);
}

// ---- Scenario C: unlisted sender through the webhook ----

#[tokio::test]
async fn scenario_c_unlisted_sender_is_refused_at_the_gate() {
    let harness = TestHarness::builder()
        .with_answers(vec![statement("SELECT * FROM clients", "Listar clientes")])
        .build()
        .await
        .unwrap();
    let gate = Gate::new(
        "hook-secret",
        vec!["149.154.160.0/20".parse().unwrap()],
        vec!["1001".into()],
    )
    .unwrap();
    let app = pika_gateway::router(GatewayState {
        gate: Arc::new(gate),
        dispatcher: harness.dispatcher.clone(),
        channel: harness.channel.clone(),
        trust_forwarded_for: false,
        tasks: TaskTracker::new(),
    });

    let body = serde_json::json!({
        "update_id": 10,
        "message": {
            "message_id": 3,
            "date": 1700000000i64,
            "chat": { "id": 4242, "type": "private", "first_name": "Eve" },
            "from": { "id": 4242, "is_bot": false, "first_name": "Eve", "username": "eve" },
            "text": "muéstrame todos los clientes",
        },
    })
    .to_string();
    let mut request = Request::post(WEBHOOK_PATH)
        .header("x-telegram-bot-api-secret-token", "hook-secret")
        .body(Body::from(body))
        .unwrap();
    let peer: SocketAddr = "149.154.167.220:443".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sent = tokio::time::timeout(Duration::from_secs(5), harness.channel.wait_for_sent(1))
        .await
        .expect("refusal was not sent");
    assert_eq!(sent[0].text, "⛔ No tienes permiso para usar este bot.");
    assert_eq!(harness.translator.call_count().await, 0);
    assert_eq!(harness.executor.call_count(), 0);
}

// ---- Scenario D: translator times out twice ----

#[tokio::test]
async fn scenario_d_translator_timeout_asks_to_rephrase_and_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "{\"tipo\":\"mensaje\",\"texto\":\"tarde\"}" } }]
                })),
        )
        .mount(&server)
        .await;

    let translator = OpenAiTranslator::new(&OpenAiConfig {
        api_key: Some("sk-test".into()),
        base_url: server.uri(),
        timeout_secs: 1,
        ..OpenAiConfig::default()
    })
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pika.db");
    let database = Database::open(&db_path.to_string_lossy()).await.unwrap();
    let executor = SqliteExecutor::new(database, 10, Duration::from_secs(5))
        .await
        .unwrap();
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(900)));
    let dispatcher = Dispatcher::new(
        Arc::new(translator),
        Arc::new(executor),
        sessions.clone(),
        DispatcherSettings {
            confirm_writes: true,
            ..DispatcherSettings::default()
        },
    );

    let sender = SenderId::from("1001");
    let pending = PendingState::AwaitingClarification {
        original_message: "pedido de brownies para Ana".into(),
        question: "¿Cuántas cajas?".into(),
    };
    sessions.set(&sender, pending.clone()).await;

    let reply = dispatcher.handle(&inbound("1001", "tres")).await.unwrap();

    assert!(reply.text.contains("reformularla"));
    assert_eq!(sessions.get(&sender).await, pending);
    let attempts = server.received_requests().await.unwrap_or_default();
    assert_eq!(attempts.len(), 2);
}

// ---- Scenario E: chained reads ----

#[tokio::test]
async fn scenario_e_chained_selects_are_denied() {
    let harness = TestHarness::builder()
        .with_answers(vec![statement(
            "SELECT * FROM clients; SELECT * FROM orders;",
            "Listar clientes y pedidos",
        )])
        .build()
        .await
        .unwrap();

    let reply = harness.send("clientes y pedidos").await.unwrap();

    assert_eq!(reply, DENIAL);
    assert!(!reply.contains("SELECT"));
    assert_eq!(harness.executor.call_count(), 0);
}

// ---- Cross-cutting ----

#[tokio::test]
async fn cancel_while_idle_is_a_no_op() {
    let harness = TestHarness::builder().build().await.unwrap();
    let sender = SenderId::from(pika_test_utils::DEFAULT_SENDER);

    for _ in 0..2 {
        let reply = harness.send("/cancelar").await.unwrap();
        assert_eq!(reply, "❌ Operación cancelada.");
        assert_eq!(harness.sessions.get(&sender).await, PendingState::Idle);
    }
    assert_eq!(harness.executor.call_count(), 0);
}

#[tokio::test]
async fn order_with_items_keeps_total_consistent() {
    let harness = TestHarness::builder()
        .with_answers(vec![
            statement(
                "INSERT INTO orders (id, total, city) VALUES ('o-1', 36000, 'Medellín')",
                "Crear pedido",
            ),
            statement(
                "INSERT INTO order_items (order_id, product_name, variant, quantity, unit, unit_price) \
                 VALUES ('o-1', 'Muffin', 'Chocolate', 2, 'caja', 12000), \
                        ('o-1', 'Brownie', NULL, 1, 'caja', 12000)",
                "Agregar productos al pedido",
            ),
        ])
        .without_confirmation()
        .build()
        .await
        .unwrap();

    harness.send("nuevo pedido en Medellín").await.unwrap();
    let reply = harness.send("2 cajas de muffin y 1 de brownie").await.unwrap();
    assert!(reply.contains("Filas afectadas: 2"));

    let mismatched = harness
        .count(
            "SELECT COUNT(*) FROM orders o WHERE o.total <> \
             (SELECT SUM(quantity * unit_price) FROM order_items i WHERE i.order_id = o.id)",
        )
        .await;
    assert_eq!(mismatched, 0);
}

#[tokio::test]
async fn replies_go_through_the_channel_in_order() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.send("/start").await.unwrap();
    harness.send("/id").await.unwrap();

    let sent = harness.channel.sent_messages().await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("Bienvenido"));
    assert!(sent[1].text.contains("1001"));
}
