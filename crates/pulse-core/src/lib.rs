//! # pulse-core
//!
//! Foundation types for the Pulse real-time update hub.
//!
//! This crate provides the shared vocabulary the server and client crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::UserId`], [`ids::ConnectionId`]
//!   as newtypes
//! - **Wire protocol**: [`protocol::ClientFrame`] and [`protocol::ServerFrame`]
//!   JSON frames exchanged over a hub connection
//! - **Envelopes**: [`envelope::UpdateEnvelope`] decoding for events arriving
//!   on the broadcast channel
//! - **Reconnect**: [`retry::ReconnectPolicy`] backoff calculation
//!
//! ## Crate Position
//!
//! Foundation crate. No I/O, no async. Depended on by all other pulse crates.

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod protocol;
pub mod retry;
