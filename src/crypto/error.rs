//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur in the crypto primitives adapter.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The platform cannot provide a cryptographically secure RNG.
    ///
    /// Fatal to the session; the user must be told to use a supporting
    /// device. Nothing in this crate falls back to a weaker source.
    #[error("secure randomness unavailable: {0}")]
    Unavailable(String),

    /// A public key failed to import (wrong length or invalid point).
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    /// The AEAD encrypt call itself failed (platform error, should not
    /// occur in normal operation).
    #[error("encryption failure")]
    EncryptionFailure,

    /// The authentication tag did not verify: the ciphertext was tampered
    /// with or sealed under a different key. Non-fatal; callers drop the
    /// offending message and continue.
    #[error("authentication failure")]
    AuthenticationFailure,
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
