//! WebSocket connection management, subscription registry, and fan-out.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Authenticated upgrade, per-connection read/write loops |
//! | `session` | Per-connection state: identity, subscriptions, send queue |
//! | `handler` | Control-frame parsing and dispatch |
//! | `registry` | Identity and topic indexes over live connections |
//! | `bridge` | Update bus → per-topic fan-out |
//! | `heartbeat` | Periodic ping/pong for connection liveness detection |
//!
//! ## Data Flow
//!
//! `connection` gates the handshake, registers the connection, then feeds
//! inbound frames to `handler`, which mutates `registry`. The single
//! `bridge` task consumes the update bus and delivers to the snapshot
//! returned by `registry::Registry::subscribers_of`.

pub mod bridge;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
pub mod session;
