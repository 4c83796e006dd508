//! Identity and topic indexes over live connections.
//!
//! The registry is the single source of truth for connection membership.
//! One `RwLock` guards the connection table and both indexes; a
//! connection's own subscription set is only ever mutated while that lock
//! is held for writing, so the bridge can never observe a half-applied
//! subscribe. Empty index keys are pruned so memory tracks active
//! subscriptions only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::gauge;
use tokio::sync::RwLock;
use tracing::debug;

use pulse_core::ids::{ConnectionId, SessionId, UserId};

use crate::metrics::WS_CONNECTIONS_ACTIVE;

use super::session::ClientConnection;

/// Thread-safe bidirectional indexes: identity → connections and
/// topic → subscribed connections.
pub struct Registry {
    inner: RwLock<Indexes>,
    /// Atomic mirror of the table size (avoids read-locking for counts).
    active: AtomicUsize,
}

#[derive(Default)]
struct Indexes {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
    by_session: HashMap<SessionId, HashSet<ConnectionId>>,
}

impl Indexes {
    /// Remove a connection from every topic it subscribes to, pruning
    /// topic keys whose subscriber set empties.
    fn unsubscribe_all(&mut self, conn: &ClientConnection) {
        for session_id in conn.drain_subscriptions() {
            if let Some(subscribers) = self.by_session.get_mut(&session_id) {
                let _ = subscribers.remove(&conn.id);
                if subscribers.is_empty() {
                    let _ = self.by_session.remove(&session_id);
                }
            }
        }
    }
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indexes::default()),
            active: AtomicUsize::new(0),
        }
    }

    /// Add a freshly authenticated connection under its identity.
    pub async fn register(&self, conn: Arc<ClientConnection>) {
        let mut inner = self.inner.write().await;
        let _ = inner
            .by_user
            .entry(conn.user_id.clone())
            .or_default()
            .insert(conn.id.clone());
        if inner.connections.insert(conn.id.clone(), conn).is_none() {
            let _ = self.active.fetch_add(1, Ordering::Relaxed);
            gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        }
    }

    /// Remove a connection: from the identity index (pruning the identity
    /// key when its set empties) and from every subscribed topic.
    ///
    /// Idempotent: the second call for the same ID is a no-op, so the
    /// Closed transition stays exactly-once even under racing triggers.
    pub async fn deregister(&self, conn_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        let mut inner = self.inner.write().await;
        let conn = inner.connections.remove(conn_id)?;
        inner.unsubscribe_all(&conn);
        if let Some(ids) = inner.by_user.get_mut(&conn.user_id) {
            let _ = ids.remove(conn_id);
            if ids.is_empty() {
                let _ = inner.by_user.remove(&conn.user_id);
            }
        }
        let _ = self.active.fetch_sub(1, Ordering::Relaxed);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        debug!(conn_id = %conn_id, user_id = %conn.user_id, "connection deregistered");
        Some(conn)
    }

    /// Subscribe a connection to a topic. Idempotent; creates the topic's
    /// subscriber set on first use. Returns `false` when the connection is
    /// no longer registered.
    pub async fn subscribe(&self, conn_id: &ConnectionId, session_id: SessionId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(conn) = inner.connections.get(conn_id).cloned() else {
            return false;
        };
        let _ = conn.insert_subscription(session_id.clone());
        let _ = inner
            .by_session
            .entry(session_id)
            .or_default()
            .insert(conn_id.clone());
        true
    }

    /// Unsubscribe a connection from a topic, pruning the topic key when
    /// its subscriber set empties. No-op when not subscribed.
    pub async fn unsubscribe(&self, conn_id: &ConnectionId, session_id: &SessionId) {
        let mut inner = self.inner.write().await;
        if let Some(conn) = inner.connections.get(conn_id).cloned() {
            let _ = conn.remove_subscription(session_id);
        }
        if let Some(subscribers) = inner.by_session.get_mut(session_id) {
            let _ = subscribers.remove(conn_id);
            if subscribers.is_empty() {
                let _ = inner.by_session.remove(session_id);
            }
        }
    }

    /// Remove a connection from every topic it subscribes to. Used on
    /// disconnect so no topic retains a reference to a dead connection.
    pub async fn unsubscribe_all(&self, conn_id: &ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(conn) = inner.connections.get(conn_id).cloned() {
            inner.unsubscribe_all(&conn);
        }
    }

    /// Snapshot of the connections currently subscribed to a topic.
    ///
    /// The returned vector is detached from the indexes: concurrent
    /// subscribes and unsubscribes never invalidate an in-flight fan-out.
    pub async fn subscribers_of(&self, session_id: &SessionId) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.read().await;
        inner
            .by_session
            .get(session_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connections currently open for an identity.
    pub async fn connections_for_user(&self, user_id: &UserId) -> Vec<Arc<ClientConnection>> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(user_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.connections.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the identity index still holds a key for this user.
    pub async fn has_user(&self, user_id: &UserId) -> bool {
        self.inner.read().await.by_user.contains_key(user_id)
    }

    /// Whether the topic index still holds a key for this session.
    pub async fn has_topic(&self, session_id: &SessionId) -> bool {
        self.inner.read().await.by_session.contains_key(session_id)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Number of topics with at least one subscriber.
    pub async fn topic_count(&self) -> usize {
        self.inner.read().await.by_session.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
