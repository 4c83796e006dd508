//! # pulse-client
//!
//! Reconnecting WebSocket client for the Pulse update hub.
//!
//! The hub deliberately forgets a connection's subscriptions the moment it
//! closes, so restoring topic interest after a drop is the client's job.
//! [`client::HubClient`] owns a background connection task that:
//!
//! - connects with the bearer credential in the handshake URL,
//! - re-issues `subscribe_session` for every desired topic on reconnect,
//! - backs off with doubling, capped delays and a bounded attempt count,
//! - surfaces decoded server frames on a broadcast channel.

#![deny(unsafe_code)]

pub mod client;

pub use client::{ClientConfig, ClientError, HubClient};
