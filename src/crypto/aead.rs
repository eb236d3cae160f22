//! Authenticated encryption for session payloads.
//!
//! Every payload that transits the relay is sealed with AES-256-GCM under
//! the session's [`SharedKey`]. Each seal call draws a fresh random 96-bit
//! IV; reusing an IV under the same key breaks both confidentiality and
//! integrity of GCM, so no code path may cache or derive IVs.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

use crate::crypto::error::{CryptoError, Result};

/// Length of an AES-GCM IV in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Length of the symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// A symmetric session key for AES-256-GCM.
///
/// Derived once per session via ECDH key agreement
/// ([`SessionKeypair::derive_shared_key`](crate::crypto::SessionKeypair::derive_shared_key)),
/// never transmitted, never persisted. The key bytes are zeroized when the
/// value is dropped, which is how a session ends: drop the key.
///
/// Encrypt and decrypt are stateless pure functions of (key, iv, data), so
/// one `SharedKey` may be shared between a send path and a receive path
/// without locking.
#[derive(ZeroizeOnDrop)]
pub struct SharedKey {
    /// The raw key bytes (zeroized on drop).
    bytes: [u8; KEY_LEN],
}

/// The output of one seal operation: the IV it drew plus the ciphertext
/// (authentication tag included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// The fresh random IV used for this message only.
    pub iv: [u8; IV_LEN],
    /// Ciphertext with the GCM tag appended.
    pub ciphertext: Vec<u8>,
}

impl SharedKey {
    /// Wraps raw key bytes as a session key.
    ///
    /// Normally called by the key-derivation step; exposed so tests can
    /// construct keys directly.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Seals a plaintext under this key with a fresh random IV.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unavailable`] if the OS RNG cannot produce an
    /// IV, or [`CryptoError::EncryptionFailure`] on a cipher-level error
    /// (should not occur in normal operation).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<SealedMessage> {
        let mut iv = [0u8; IV_LEN];
        OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|e| CryptoError::Unavailable(e.to_string()))?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| CryptoError::EncryptionFailure)?;

        Ok(SealedMessage { iv, ciphertext })
    }

    /// Opens a sealed message, verifying the authentication tag.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::AuthenticationFailure`] if the tag does not
    /// verify — tampered ciphertext, wrong IV, or a key derived from a
    /// different exchange. No plaintext is ever returned in that case.
    pub fn decrypt(&self, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes));
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("SharedKey").finish_non_exhaustive()
    }
}
