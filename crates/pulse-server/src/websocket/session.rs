//! Per-connection session state.
//!
//! A [`ClientConnection`] is created after a successful handshake and owned
//! by the registry until teardown. It carries the authenticated identity,
//! the connection's current subscription set, and a bounded outbound queue
//! decoupling fan-out from the socket write loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pulse_core::ids::{ConnectionId, SessionId, UserId};

/// State for a single authenticated WebSocket connection.
pub struct ClientConnection {
    /// Unique connection ID (UUID v7).
    pub id: ConnectionId,
    /// Subject of the identity the connection authenticated as.
    pub user_id: UserId,
    /// Outbound frame queue; drained by the connection's write loop.
    outbound: mpsc::Sender<Arc<String>>,
    /// Topics this connection currently subscribes to. Mutated only by the
    /// registry while it holds its own write lock, so the topic index and
    /// this set can never disagree.
    subscriptions: parking_lot::RwLock<HashSet<SessionId>>,
    /// Lifetime count of frames dropped on a full queue.
    dropped: AtomicU64,
    /// Stamped by the read loop on every pong.
    last_pong: parking_lot::Mutex<Instant>,
    /// Cancelled to force the connection's teardown (slow client, shutdown).
    cancel: CancellationToken,
}

impl ClientConnection {
    /// Create a connection record for a freshly authenticated socket.
    #[must_use]
    pub fn new(user_id: UserId, outbound: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::generate(),
            user_id,
            outbound,
            subscriptions: parking_lot::RwLock::new(HashSet::new()),
            dropped: AtomicU64::new(0),
            last_pong: parking_lot::Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
        }
    }

    /// Queue a frame for delivery without blocking.
    ///
    /// Returns `false` when the frame was dropped: either the queue is full
    /// (slow client, newest frame is shed) or the write loop is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Write loop already dead; teardown is in progress.
                false
            }
        }
    }

    /// Lifetime number of frames shed on a full queue.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Snapshot of the connection's current subscriptions.
    pub fn subscriptions(&self) -> Vec<SessionId> {
        self.subscriptions.read().iter().cloned().collect()
    }

    /// Whether the connection currently subscribes to a topic.
    pub fn is_subscribed(&self, session_id: &SessionId) -> bool {
        self.subscriptions.read().contains(session_id)
    }

    pub(crate) fn insert_subscription(&self, session_id: SessionId) -> bool {
        self.subscriptions.write().insert(session_id)
    }

    pub(crate) fn remove_subscription(&self, session_id: &SessionId) -> bool {
        self.subscriptions.write().remove(session_id)
    }

    pub(crate) fn drain_subscriptions(&self) -> Vec<SessionId> {
        self.subscriptions.write().drain().collect()
    }

    /// Token observed by the connection's loops; cancelling it forces the
    /// Closed transition.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Force this connection to tear down (used when a client falls too far
    /// behind or the hub is shutting down).
    pub fn force_close(&self) {
        self.cancel.cancel();
    }

    /// Record a pong from the client.
    pub fn touch_pong(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the client last answered a ping.
    pub fn pong_age(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("dropped", &self.drop_count())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
