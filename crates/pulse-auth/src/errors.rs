//! Auth error types.

/// Errors that can occur during credential verification.
///
/// Deliberately a single opaque variant: callers (and therefore clients)
/// learn only accept/reject. Distinguishing an expired token from a forged
/// one at the handshake boundary would leak a validity oracle.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential is missing, malformed, expired, or forged.
    #[error("unauthenticated")]
    Unauthenticated,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_opaque() {
        assert_eq!(AuthError::Unauthenticated.to_string(), "unauthenticated");
    }
}
