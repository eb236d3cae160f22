//! Types for the relay key-exchange contract.
//!
//! The request/response shapes mirror the relay's wire format exactly:
//! `POST create-session` with `{"key": ...}` answers `{"session": ...}`,
//! and `GET get-key/{token}` answers `{"key": ...}`.

use serde::{Deserialize, Serialize};

/// An opaque, server-issued, one-time-use session identifier.
///
/// Correlates the initiator's public key with exactly one consumer. The
/// relay invalidates it on first successful consumption; the client never
/// retries a token. The string travels out of band (typically inside a QR
/// code) and carries no secret material — possession of a token only lets
/// someone *join* the session, after which every payload is end-to-end
/// encrypted against them knowing the derived key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token string (e.g. the text decoded from a QR code).
    ///
    /// # Examples
    ///
    /// ```
    /// use rendezvous_core::relay::SessionToken;
    ///
    /// let token = SessionToken::new("d81a676f");
    /// assert_eq!(token.as_str(), "d81a676f");
    /// ```
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token string, for QR encoding or URL paths.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of `POST create-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// The initiator's public key, base64-encoded SEC1 point.
    pub key: String,
}

/// Response of `POST create-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    /// The freshly issued single-use token.
    pub session: String,
}

/// Response of `GET get-key/{token}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeSessionResponse {
    /// The stored public key, base64-encoded SEC1 point.
    pub key: String,
}
