//! Authenticated WebSocket upgrade and per-connection read/write loops.
//!
//! The token gate runs before the upgrade completes: a missing or invalid
//! credential is answered with `401 Unauthorized` and no connection record
//! is ever created. After the upgrade the socket is split; the write loop
//! drains the connection's outbound queue and owns the heartbeat, the read
//! loop feeds inbound frames to the dispatch handler. Whichever loop ends
//! first (clean close, transport error, stale heartbeat, or a forced
//! close from the bridge) funnels into a single teardown point, so
//! deregistration runs exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pulse_auth::{AuthError, IdentityClaims};
use pulse_core::protocol::ServerFrame;

use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::server::AppState;

use super::handler;
use super::heartbeat::HeartbeatConfig;
use super::registry::Registry;
use super::session::ClientConnection;

/// `GET /ws?token=…`: credential-gated WebSocket upgrade.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token") else {
        debug!("upgrade rejected: no token");
        return unauthorized();
    };
    let identity = match state.verifier.verify(token) {
        Ok(identity) => identity,
        Err(AuthError::Unauthenticated) => return unauthorized(),
    };
    ws.on_upgrade(move |socket| serve_connection(socket, state, identity))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "unauthorized").into_response()
}

/// Own one authenticated socket from registration to teardown.
async fn serve_connection(socket: WebSocket, state: AppState, identity: IdentityClaims) {
    let (sink, stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.send_queue_depth);
    let conn = Arc::new(ClientConnection::new(identity.user_id.clone(), outbound_tx));
    state.registry.register(Arc::clone(&conn)).await;
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(conn_id = %conn.id, user_id = %conn.user_id, "connection established");

    // Deterministic readiness signal: the client may subscribe as soon as
    // it sees this.
    handler::send_frame(&conn, &ServerFrame::connected(identity.user_id));

    let mut send_task = tokio::spawn(write_loop(
        sink,
        outbound_rx,
        Arc::clone(&conn),
        state.config.heartbeat,
    ));
    let mut recv_task = tokio::spawn(read_loop(
        stream,
        Arc::clone(&state.registry),
        Arc::clone(&conn),
    ));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        () = conn.cancel_token().cancelled() => {
            send_task.abort();
            recv_task.abort();
        }
    }

    // Closed transition; runs exactly once regardless of which trigger won.
    let _ = state.registry.deregister(&conn.id).await;
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    info!(conn_id = %conn.id, user_id = %conn.user_id, "connection closed");
}

/// Drain the outbound queue into the socket; ping on the heartbeat
/// interval and bail out when the peer goes stale or a write fails.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Arc<String>>,
    conn: Arc<ClientConnection>,
    heartbeat: HeartbeatConfig,
) {
    let mut ping = tokio::time::interval(heartbeat.interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                match frame {
                    Some(json) => {
                        if let Err(e) = sink.send(Message::Text(json.as_str().into())).await {
                            // A write failure is an implicit close for this
                            // connection only.
                            debug!(conn_id = %conn.id, error = %e, "write failed");
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping.tick() => {
                if heartbeat.is_stale(conn.pong_age()) {
                    warn!(conn_id = %conn.id, "heartbeat timed out");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Feed inbound frames to the dispatcher until close or transport error.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    registry: Arc<Registry>,
    conn: Arc<ClientConnection>,
) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handler::handle_frame(&registry, &conn, text.as_str()).await;
            }
            Ok(Message::Pong(_)) => conn.touch_pong(),
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn.id, "client closed");
                break;
            }
            // Pings are answered by the protocol layer; binary frames are
            // not part of the hub protocol.
            Ok(Message::Ping(_) | Message::Binary(_)) => {}
            Err(e) => {
                debug!(conn_id = %conn.id, error = %e, "transport error");
                break;
            }
        }
    }
}
