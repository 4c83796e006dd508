//! # pulse-auth
//!
//! Bearer-token verification for the Pulse update hub.
//!
//! The surrounding system issues HS256 JWTs; the hub only ever *verifies*
//! them at WebSocket handshake time. Verification is pure and stateless:
//! a credential either yields an [`IdentityClaims`] or an opaque
//! [`AuthError::Unauthenticated`]. The concrete failure reason (expired,
//! bad signature, malformed) is logged but never surfaced to the caller,
//! so the handshake cannot be used as a token-validity oracle.

#![deny(unsafe_code)]

pub mod errors;
pub mod verifier;

pub use errors::AuthError;
pub use verifier::{IdentityClaims, TokenVerifier};
