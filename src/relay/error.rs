//! Error types for relay operations.

use thiserror::Error;

/// Errors that can occur while talking to the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The token is missing, expired, or already consumed.
    ///
    /// The relay reports all three the same way and this client keeps it
    /// that way: callers (and anyone probing tokens) cannot learn whether
    /// a token was ever valid.
    #[error("session not found")]
    SessionNotFound,

    /// An HTTP call to the key-exchange store failed.
    #[error("relay request failed: {0}")]
    Http(String),

    /// The relay base URL is not a valid http(s) URL.
    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),

    /// The duplex connection could not be established.
    #[error("failed to connect to {url}: {reason}")]
    Connection {
        /// The websocket URL that failed.
        url: String,
        /// The reason for the failure.
        reason: String,
    },

    /// The duplex connection is closed.
    #[error("relay connection closed")]
    Closed,
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_display() {
        assert_eq!(RelayError::SessionNotFound.to_string(), "session not found");
    }

    #[test]
    fn http_error_display() {
        let error = RelayError::Http("status 500".to_string());
        assert_eq!(error.to_string(), "relay request failed: status 500");
    }

    #[test]
    fn invalid_url_display() {
        let error = RelayError::InvalidUrl("ftp://relay".to_string());
        assert_eq!(error.to_string(), "invalid relay URL: ftp://relay");
    }

    #[test]
    fn connection_error_display() {
        let error = RelayError::Connection {
            url: "wss://relay.example.com/ws/abc".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "failed to connect to wss://relay.example.com/ws/abc: connection refused"
        );
    }

    #[test]
    fn closed_display() {
        assert_eq!(RelayError::Closed.to_string(), "relay connection closed");
    }
}
