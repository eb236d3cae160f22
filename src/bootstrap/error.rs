//! Error types for the session bootstrap.

use thiserror::Error;

use crate::bootstrap::protocol::BootstrapPhase;
use crate::crypto::CryptoError;
use crate::relay::RelayError;

/// Errors that can occur while establishing a session.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The token is missing, expired, or already consumed — deliberately
    /// indistinguishable. The bootstrap attempt is over; retry with a new
    /// token, never the same one.
    #[error("session not found")]
    SessionNotFound,

    /// The relay failed for a reason other than the token.
    #[error(transparent)]
    Relay(RelayError),

    /// A crypto operation failed (RNG unavailable, malformed peer key).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// `initiate` or `join` was called on a bootstrap that already left
    /// Idle. Call `reset` first to start over.
    #[error("bootstrap already started (phase {0:?})")]
    AlreadyStarted(BootstrapPhase),

    /// `complete` was called but no exchange is awaiting a peer.
    #[error("no exchange awaiting a peer")]
    NotAwaitingPeer,

    /// The frame handed to `complete` is not a key announcement.
    #[error("malformed key announcement: {0}")]
    MalformedAnnouncement(String),

    /// An announcement failed to serialize.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RelayError> for BootstrapError {
    fn from(e: RelayError) -> Self {
        match e {
            // Collapse here too, so no caller can tell the cases apart
            RelayError::SessionNotFound => Self::SessionNotFound,
            other => Self::Relay(other),
        }
    }
}

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_display() {
        assert_eq!(
            BootstrapError::SessionNotFound.to_string(),
            "session not found"
        );
    }

    #[test]
    fn relay_session_not_found_maps_to_bootstrap_session_not_found() {
        let err: BootstrapError = RelayError::SessionNotFound.into();
        assert!(matches!(err, BootstrapError::SessionNotFound));
    }

    #[test]
    fn other_relay_errors_stay_relay_errors() {
        let err: BootstrapError = RelayError::Http("status 500".to_string()).into();
        assert!(matches!(err, BootstrapError::Relay(_)));
    }

    #[test]
    fn crypto_error_passes_through() {
        let err: BootstrapError = CryptoError::MalformedKey("bad point".to_string()).into();
        assert_eq!(err.to_string(), "malformed public key: bad point");
    }

    #[test]
    fn already_started_display_names_the_phase() {
        let err = BootstrapError::AlreadyStarted(BootstrapPhase::AwaitingPeer);
        assert_eq!(
            err.to_string(),
            "bootstrap already started (phase AwaitingPeer)"
        );
    }

    #[test]
    fn not_awaiting_peer_display() {
        assert_eq!(
            BootstrapError::NotAwaitingPeer.to_string(),
            "no exchange awaiting a peer"
        );
    }
}
