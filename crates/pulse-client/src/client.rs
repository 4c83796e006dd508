//! Hub client with auto-reconnection and subscription restore.

use std::collections::HashSet;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};

use pulse_core::ids::SessionId;
use pulse_core::protocol::{ClientFrame, ServerFrame};
use pulse_core::retry::ReconnectPolicy;

/// Default capacity of the decoded-event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1_024;

/// Errors surfaced by the client handle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The background connection task has terminated.
    #[error("client connection task is gone")]
    Closed,
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Hub WebSocket endpoint, e.g. `ws://localhost:8765/ws`.
    pub url: String,
    /// Bearer credential appended to the handshake URL.
    pub token: String,
    /// Backoff between reconnection attempts.
    pub reconnect: ReconnectPolicy,
    /// Capacity of the decoded-event channel.
    pub event_buffer: usize,
}

impl ClientConfig {
    /// Config with default reconnect policy and buffering.
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect: ReconnectPolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Commands sent to the background connection task.
#[derive(Debug)]
enum Command {
    Subscribe(SessionId),
    Unsubscribe(SessionId),
    Close,
}

/// Handle to a hub connection maintained in the background.
pub struct HubClient {
    command_tx: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ServerFrame>,
}

impl HubClient {
    /// Spawn the connection task and return the handle.
    ///
    /// The task keeps reconnecting until the policy is exhausted or
    /// [`HubClient::close`] is called.
    #[must_use]
    pub fn connect(config: ClientConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        drop(tokio::spawn(connection_task(
            config,
            command_rx,
            event_tx.clone(),
        )));
        Self {
            command_tx,
            events: event_tx,
        }
    }

    /// Add a topic to the desired set and subscribe on the live
    /// connection (now, or on the next reconnect).
    pub fn subscribe(&self, session_id: impl Into<SessionId>) -> Result<(), ClientError> {
        self.command_tx
            .send(Command::Subscribe(session_id.into()))
            .map_err(|_| ClientError::Closed)
    }

    /// Drop a topic from the desired set and unsubscribe if connected.
    pub fn unsubscribe(&self, session_id: impl Into<SessionId>) -> Result<(), ClientError> {
        self.command_tx
            .send(Command::Unsubscribe(session_id.into()))
            .map_err(|_| ClientError::Closed)
    }

    /// Close the connection and stop reconnecting.
    pub fn close(&self) -> Result<(), ClientError> {
        self.command_tx
            .send(Command::Close)
            .map_err(|_| ClientError::Closed)
    }

    /// A receiver of decoded server frames. Each call returns an
    /// independent subscription starting at the current position.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ServerFrame> {
        self.events.subscribe()
    }
}

/// Serialize the subscribe frames needed to restore topic interest.
fn restore_frames(desired: &HashSet<SessionId>) -> Vec<String> {
    desired
        .iter()
        .filter_map(|session_id| {
            serde_json::to_string(&ClientFrame::SubscribeSession {
                session_id: session_id.clone(),
            })
            .ok()
        })
        .collect()
}

/// Why the session loop ended.
enum SessionEnd {
    /// Transport dropped; schedule a reconnect.
    Lost,
    /// Caller asked to close; stop for good.
    Closed,
}

async fn connection_task(
    config: ClientConfig,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<ServerFrame>,
) {
    let url = format!("{}?token={}", config.url, config.token);
    let mut desired: HashSet<SessionId> = HashSet::new();
    let mut failures: u32 = 0;

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!(url = %config.url, "connected to hub");
                failures = 0;
                match run_session(stream, &mut desired, &mut command_rx, &event_tx).await {
                    SessionEnd::Closed => {
                        info!("hub connection closed by caller");
                        return;
                    }
                    SessionEnd::Lost => warn!("hub connection lost"),
                }
            }
            Err(e) => warn!(url = %config.url, error = %e, "hub unreachable"),
        }

        if config.reconnect.exhausted(failures) {
            error!(failures, "reconnect attempts exhausted, giving up");
            return;
        }
        let delay = config.reconnect.delay_for(failures);
        failures = failures.saturating_add(1);
        warn!(
            delay_ms = delay.as_millis() as u64,
            attempt = failures,
            "reconnecting to hub"
        );
        tokio::time::sleep(delay).await;
    }
}

async fn run_session(
    mut stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    desired: &mut HashSet<SessionId>,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &broadcast::Sender<ServerFrame>,
) -> SessionEnd {
    // The hub never remembers subscriptions across a close; restore the
    // desired set before anything else.
    for frame in restore_frames(desired) {
        if stream.send(Message::Text(frame.into())).await.is_err() {
            return SessionEnd::Lost;
        }
    }

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(frame) => {
                                // Err just means no listener right now.
                                let _ = event_tx.send(frame);
                            }
                            Err(e) => debug!(error = %e, "ignoring unrecognized server frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "hub transport error");
                        return SessionEnd::Lost;
                    }
                }
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Subscribe(session_id)) => {
                        let _ = desired.insert(session_id.clone());
                        let frame = ClientFrame::SubscribeSession { session_id };
                        if !send_frame(&mut stream, &frame).await {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Command::Unsubscribe(session_id)) => {
                        let _ = desired.remove(&session_id);
                        let frame = ClientFrame::UnsubscribeSession { session_id };
                        if !send_frame(&mut stream, &frame).await {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = stream.send(Message::Close(None)).await;
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }
}

async fn send_frame(
    stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    frame: &ClientFrame,
) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => stream.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "failed to serialize frame");
            true
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new("ws://localhost:8765/ws", "tok");
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        assert_eq!(config.reconnect.base_delay_ms, 1_000);
        assert_eq!(config.reconnect.max_attempts, 10);
    }

    #[test]
    fn restore_frames_cover_every_desired_topic() {
        let desired: HashSet<SessionId> = ["s1", "s2"].into_iter().map(Into::into).collect();
        let frames = restore_frames(&desired);
        assert_eq!(frames.len(), 2);
        for frame in &frames {
            let value: serde_json::Value = serde_json::from_str(frame).unwrap();
            assert_eq!(value["type"], "subscribe_session");
        }
    }

    #[test]
    fn restore_frames_empty_without_subscriptions() {
        assert!(restore_frames(&HashSet::new()).is_empty());
    }

    #[tokio::test]
    async fn commands_error_once_task_is_gone() {
        // Connect to nothing with a policy that gives up immediately.
        let config = ClientConfig {
            url: "ws://127.0.0.1:1/ws".to_owned(),
            token: "tok".to_owned(),
            reconnect: ReconnectPolicy {
                base_delay_ms: 1,
                max_delay_ms: 2,
                max_attempts: 1,
            },
            event_buffer: 8,
        };
        let client = HubClient::connect(config);
        // Give the task time to fail twice and exit.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(matches!(
            client.subscribe("s1"),
            Err(ClientError::Closed)
        ));
    }
}
