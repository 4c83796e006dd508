//! # pulse-server
//!
//! The Pulse update hub: an axum HTTP + WebSocket server that authenticates
//! long-lived connections, tracks per-topic subscriptions, and fans out
//! events arriving on the process-wide update bus to subscribed clients.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `config` | Hub configuration (bind address, secret, queue sizing) |
//! | `server` | Router assembly, health and metrics endpoints |
//! | `upstream` | Subscriber for the external broadcast channel |
//! | `websocket` | Connection lifecycle, registry, protocol, fan-out |
//! | `metrics` | Prometheus recorder and metric name constants |
//!
//! ## Data Flow
//!
//! Handshake → token gate → registry registration → per-connection
//! read/write loops. Independently, `upstream` pushes raw envelopes into
//! the [`websocket::bridge::UpdateBus`]; the single bridge task decodes
//! them and delivers to every registered subscriber of the topic.

#![deny(unsafe_code)]

pub mod config;
pub mod metrics;
pub mod server;
pub mod upstream;
pub mod websocket;
