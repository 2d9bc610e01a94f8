// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router and end-to-end WebSocket tests for the gateway.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use kindred_gateway::{GatewayState, build_router};
use kindred_hub::codec::{self, Command};
use kindred_hub::Event;
use kindred_test_utils::{MockGenerator, TestHarness};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn get_json(state: GatewayState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_reports_live_sessions() {
    let harness = TestHarness::builder().build();
    let (status, json) = get_json(GatewayState::new(harness.ctx.clone()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["live_sessions"], 0);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn sessions_route_lists_active_sessions() {
    let harness = TestHarness::builder().build();
    let mut client = harness.connect(TestHarness::params("c1"));
    client.send(&Command::Ping);
    assert_eq!(client.expect_event().await, Event::Pong);

    let (status, json) = get_json(GatewayState::new(harness.ctx.clone()), "/v1/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sessions"], serde_json::json!(["session-1-c1"]));
}

#[tokio::test]
async fn stopped_hub_is_reported_unavailable() {
    let harness = TestHarness::builder().build();
    let state = GatewayState::new(harness.ctx.clone());
    harness.shutdown().await;

    let (status, json) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().unwrap().contains("not running"));
}

#[tokio::test]
async fn websocket_chat_round_trip() {
    let harness = TestHarness::builder()
        .with_generator(MockGenerator::with_responses(vec!["Greetings!".into()]))
        .build();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(kindred_gateway::serve(
        listener,
        GatewayState::new(harness.ctx.clone()),
        shutdown.clone(),
    ));

    let url = format!("ws://{addr}/ws?characterId=1&clientId=c9&sessionId=s9");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    socket
        .send(Message::Text(
            r#"{"type":"chat","content":{"sender":"user","content":"hello"}}"#.into(),
        ))
        .await
        .unwrap();

    let mut events = Vec::new();
    while events.len() < 4 {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("server reply in time")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = msg {
            events.push(codec::decode_event(text.as_str()).unwrap());
        }
    }
    assert!(matches!(events[0], Event::Ack { .. }));
    assert!(matches!(&events[3], Event::Chat(turn) if turn.content == "Greetings!"));
    assert_eq!(
        harness.ctx.hub.active_sessions().await.unwrap(),
        vec!["s9".to_string()]
    );

    socket.close(None).await.unwrap();
    shutdown.cancel();
    server.await.unwrap().unwrap();
}
