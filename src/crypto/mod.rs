//! Crypto primitives adapter: P-256 ECDH, HKDF-SHA256, AES-256-GCM.
//!
//! This module wraps key generation, key agreement and authenticated
//! encryption behind a small stable surface so the bootstrap and channel
//! layers never touch curve or cipher types directly.
//!
//! # Architecture
//!
//! ```text
//! SessionKeypair (P-256)  +  peer PublicKey
//!            ↓ diffie_hellman
//!      shared secret
//!            ↓ HKDF-SHA256 ("rendezvous-v1 aes-256-gcm")
//!        SharedKey (AES-256-GCM)
//!            ↓ encrypt / decrypt
//!     SealedMessage { iv, ciphertext }
//! ```
//!
//! # Security
//!
//! - Private keys never leave the process and are zeroized on drop
//! - Every seal draws a fresh random 96-bit IV; IVs are never derived,
//!   counted or cached
//! - Tag verification failures are a distinguishable, non-fatal error

mod aead;
mod error;
mod keys;

pub use aead::{SealedMessage, SharedKey, IV_LEN, KEY_LEN};
pub use error::{CryptoError, Result};
pub use keys::{fingerprint, import_public_key, import_public_key_b64, SessionKeypair};
