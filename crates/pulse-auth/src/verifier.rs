//! HS256 token verification.
//!
//! Mirrors the issuing system's token shape: the subject travels in a
//! `user_id` claim (historically a numeric user PK, so integers are
//! accepted and stringified) and `exp` is required seconds-since-epoch.
//! All other claims are retained opaquely on the decoded identity.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use tracing::debug;

use pulse_core::ids::UserId;

use crate::errors::AuthError;

/// The decoded payload of a verified credential.
///
/// Derived fresh on every handshake; the hub never persists it.
#[derive(Clone, Debug)]
pub struct IdentityClaims {
    /// Opaque subject identifier.
    pub user_id: UserId,
    /// Every claim carried by the credential, including `user_id` itself.
    pub claims: Map<String, Value>,
}

/// Validates bearer credentials extracted from the connection handshake.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Build a verifier for HS256 tokens signed with the given shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a raw credential and return the decoded identity claim.
    ///
    /// Pure and side-effect free apart from signature verification. Every
    /// failure collapses to [`AuthError::Unauthenticated`]; the concrete
    /// reason is logged at `debug` for operators only.
    pub fn verify(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(kind = ?e.kind(), "credential rejected");
                AuthError::Unauthenticated
            })?;

        let claims = data.claims;
        let user_id = match claims.get("user_id") {
            Some(Value::String(s)) if !s.is_empty() => UserId::from(s.as_str()),
            Some(Value::Number(n)) => UserId::from(n.to_string()),
            _ => {
                debug!("credential carries no usable user_id claim");
                return Err(AuthError::Unauthenticated);
            }
        };

        Ok(IdentityClaims { user_id, claims })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
