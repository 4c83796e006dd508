#![allow(missing_docs)]
//! Client-against-real-hub tests: subscription flow, drop, reconnect,
//! subscription restore.

use std::net::SocketAddr;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;

use pulse_client::{ClientConfig, HubClient};
use pulse_core::protocol::ServerFrame;
use pulse_core::retry::ReconnectPolicy;
use pulse_server::config::HubConfig;
use pulse_server::server::{AppState, router};

const SECRET: &str = "client-test-secret";

fn token_for(user: &str) -> String {
    let claims = json!({
        "user_id": user,
        "exp": chrono::Utc::now().timestamp() + 3_600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn start_hub_on(
    addr: &str,
) -> (SocketAddr, AppState, tokio::task::JoinHandle<()>) {
    let state = AppState::new(HubConfig::new(SECRET));
    let _bridge = state.spawn_bridge();
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (bound, state, server)
}

fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay_ms: 50,
        max_delay_ms: 200,
        max_attempts: 40,
    }
}

/// Await the next frame matching the predicate, skipping others.
async fn await_frame<F>(
    rx: &mut tokio::sync::broadcast::Receiver<ServerFrame>,
    mut matches: F,
) -> ServerFrame
where
    F: FnMut(&ServerFrame) -> bool,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("frame within five seconds")
            .expect("event channel open");
        if matches(&frame) {
            return frame;
        }
    }
}

async fn wait_for_topic(state: &AppState, topic: &str) {
    for _ in 0..200 {
        if state.registry.has_topic(&topic.into()).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never saw the subscription");
}

#[tokio::test]
async fn subscribes_and_receives_updates() {
    let (addr, state, _server) = start_hub_on("127.0.0.1:0").await;

    let client = HubClient::connect(ClientConfig::new(
        format!("ws://{addr}/ws"),
        token_for("u1"),
    ));
    let mut events = client.events();

    let connected = await_frame(&mut events, |f| matches!(f, ServerFrame::Connected { .. })).await;
    match connected {
        ServerFrame::Connected { user_id, .. } => assert_eq!(user_id.as_str(), "u1"),
        other => panic!("unexpected frame: {other:?}"),
    }

    client.subscribe("s1").unwrap();
    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Subscribed { .. })).await;

    state
        .bus
        .publish(r#"{"session_id":"s1","phase":"evaluation"}"#);
    let update = await_frame(&mut events, |f| {
        matches!(f, ServerFrame::SessionUpdate { .. })
    })
    .await;
    match update {
        ServerFrame::SessionUpdate { session_id, fields } => {
            assert_eq!(session_id.as_str(), "s1");
            assert_eq!(fields["phase"], "evaluation");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn reconnects_and_restores_subscriptions() {
    let (addr, state, server) = start_hub_on("127.0.0.1:0").await;

    let client = HubClient::connect(ClientConfig {
        url: format!("ws://{addr}/ws"),
        token: token_for("u1"),
        reconnect: fast_reconnect(),
        event_buffer: 256,
    });
    let mut events = client.events();

    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Connected { .. })).await;
    client.subscribe("s1").unwrap();
    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Subscribed { .. })).await;

    // Kill the hub: stop accepting, then drop the live connection the way
    // a network partition would.
    server.abort();
    // Wait for the aborted task to be dropped so its TcpListener releases the
    // port before we rebind the same address below.
    let _ = server.await;
    for conn in state.registry.connections_for_user(&"u1".into()).await {
        conn.force_close();
    }

    // Bring a fresh hub process up on the same address.
    let (_addr, state2, _server2) = start_hub_on(&addr.to_string()).await;

    // The client reconnects on its own and re-issues subscribe_session;
    // the new hub has never seen this client before.
    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Connected { .. })).await;
    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Subscribed { .. })).await;
    wait_for_topic(&state2, "s1").await;

    state2
        .bus
        .publish(r#"{"session_id":"s1","phase":"synthesis"}"#);
    let update = await_frame(&mut events, |f| {
        matches!(f, ServerFrame::SessionUpdate { .. })
    })
    .await;
    match update {
        ServerFrame::SessionUpdate { fields, .. } => {
            assert_eq!(fields["phase"], "synthesis");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn unsubscribe_is_honored_across_the_wire() {
    let (addr, state, _server) = start_hub_on("127.0.0.1:0").await;

    let client = HubClient::connect(ClientConfig::new(
        format!("ws://{addr}/ws"),
        token_for("u1"),
    ));
    let mut events = client.events();
    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Connected { .. })).await;

    client.subscribe("s1").unwrap();
    let _ = await_frame(&mut events, |f| matches!(f, ServerFrame::Subscribed { .. })).await;

    client.unsubscribe("s1").unwrap();
    for _ in 0..200 {
        if !state.registry.has_topic(&"s1".into()).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!state.registry.has_topic(&"s1".into()).await);

    state
        .bus
        .publish(r#"{"session_id":"s1","phase":"evaluation"}"#);
    // Nothing should arrive for the dropped topic.
    let quiet = tokio::time::timeout(Duration::from_millis(300), events.recv()).await;
    assert!(quiet.is_err(), "expected silence after unsubscribe");
}
