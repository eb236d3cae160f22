//! Error types for the secure channel.

use thiserror::Error;

use crate::crypto::CryptoError;

/// Errors that can occur on the secure channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A frame did not parse as an envelope, or its decrypted payload did
    /// not match the declared kind. The offending unit is dropped; the
    /// channel keeps running.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A crypto operation failed; [`CryptoError::AuthenticationFailure`]
    /// is the receive path's drop-and-log case.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An outgoing payload failed to serialize.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The channel is closed; the send was not attempted.
    #[error("channel closed")]
    ChannelClosed,

    /// The transport queue is full; the payload was dropped. Callers may
    /// retry; location ticks simply wait for the next fix.
    #[error("transport backpressure")]
    Backpressure,
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_envelope_display() {
        let err = ChannelError::MalformedEnvelope("missing iv".to_string());
        assert_eq!(err.to_string(), "malformed envelope: missing iv");
    }

    #[test]
    fn crypto_error_passes_through_transparently() {
        let err: ChannelError = CryptoError::AuthenticationFailure.into();
        assert_eq!(err.to_string(), "authentication failure");
        assert!(matches!(
            err,
            ChannelError::Crypto(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn channel_closed_display() {
        assert_eq!(ChannelError::ChannelClosed.to_string(), "channel closed");
    }

    #[test]
    fn backpressure_display() {
        assert_eq!(
            ChannelError::Backpressure.to_string(),
            "transport backpressure"
        );
    }

    #[test]
    fn serialization_error_from_serde() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: ChannelError = json_err.into();
        assert!(matches!(err, ChannelError::Serialization(_)));
    }
}
