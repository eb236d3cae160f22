//! Session keypair management for the ECDH bootstrap.
//!
//! Each client generates one P-256 keypair per sharing session. The private
//! scalar never leaves the process and is zeroized on drop by the underlying
//! `p256` type; only the public key is exported, as a raw uncompressed SEC1
//! point suitable for base64 transport inside a QR-mediated token exchange.
//!
//! # Security
//!
//! - Curve arithmetic is delegated entirely to `p256`; nothing here touches
//!   scalars or points directly, which is what keeps the agreement
//!   constant-time with respect to the private key.
//! - The ECDH output is never used as a key directly; it passes through
//!   HKDF-SHA256 bound to this protocol's AEAD suite.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::crypto::aead::{SharedKey, KEY_LEN};
use crate::crypto::error::{CryptoError, Result};

/// Domain-separation info for the HKDF step, binding the derived key to
/// this protocol version and cipher suite.
const KDF_INFO: &[u8] = b"rendezvous-v1 aes-256-gcm";

/// Length of an uncompressed SEC1 P-256 point (0x04 prefix + two
/// 32-byte coordinates).
const PUBLIC_KEY_LEN: usize = 65;

/// A P-256 keypair for one sharing session.
///
/// Created at bootstrap start, held for the lifetime of the app session,
/// never persisted. Regenerating keys means dropping this value and
/// generating a new one, which invalidates any previously derived
/// [`SharedKey`].
pub struct SessionKeypair {
    /// The private scalar (zeroized on drop by `p256`).
    secret: EphemeralSecret,

    /// Cached public key (not sensitive).
    public: PublicKey,
}

impl SessionKeypair {
    /// Generates a fresh keypair from the OS RNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unavailable`] when the OS RNG cannot be read.
    /// The RNG is probed with a fallible read first because the `p256`
    /// generation path itself panics on RNG failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use rendezvous_core::crypto::SessionKeypair;
    ///
    /// let keypair = SessionKeypair::generate().unwrap();
    /// assert_eq!(keypair.public_key_bytes().len(), 65);
    /// ```
    pub fn generate() -> Result<Self> {
        let mut probe = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut probe)
            .map_err(|e| CryptoError::Unavailable(e.to_string()))?;

        let secret = EphemeralSecret::random(&mut OsRng);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// Returns the public key as a raw uncompressed SEC1 point (65 bytes).
    #[must_use]
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes().to_vec()
    }

    /// Returns the public key base64-encoded for relay transport.
    #[must_use]
    pub fn public_key_b64(&self) -> String {
        BASE64.encode(self.public_key_bytes())
    }

    /// Returns a short hex fingerprint of the public key, safe for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public)
    }

    /// Performs ECDH agreement with the peer's public key and derives the
    /// session's AES-256-GCM key via HKDF-SHA256.
    ///
    /// Both peers arrive at the same key: the agreement is symmetric and
    /// the HKDF step uses no salt (there is no channel to agree on one
    /// before this key exists) and a fixed protocol info string.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailure`] if HKDF expansion fails;
    /// a 32-byte output is far below the HKDF bound, so this does not
    /// occur in practice.
    pub fn derive_shared_key(&self, peer_public: &PublicKey) -> Result<SharedKey> {
        let shared_secret = self.secret.diffie_hellman(peer_public);

        let hk = Hkdf::<Sha256>::new(None, shared_secret.raw_secret_bytes().as_slice());
        let mut okm = [0u8; KEY_LEN];
        hk.expand(KDF_INFO, &mut okm)
            .map_err(|_| CryptoError::EncryptionFailure)?;

        Ok(SharedKey::from_bytes(okm))
    }
}

impl std::fmt::Debug for SessionKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the private scalar
        f.debug_struct("SessionKeypair")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Imports a peer public key from raw uncompressed SEC1 bytes.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedKey`] if the length is not 65 bytes or
/// the bytes do not encode a valid point on the curve.
pub fn import_public_key(bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(CryptoError::MalformedKey(format!(
            "expected {PUBLIC_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    PublicKey::from_sec1_bytes(bytes).map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

/// Imports a peer public key from its base64 relay encoding.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedKey`] on invalid base64 or an invalid
/// point encoding.
pub fn import_public_key_b64(encoded: &str) -> Result<PublicKey> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| CryptoError::MalformedKey(format!("base64 decode error: {e}")))?;
    import_public_key(&bytes)
}

/// Short hex fingerprint of a public key (first 8 bytes of its SHA-256),
/// for log lines that must not carry whole keys.
#[must_use]
pub fn fingerprint(public: &PublicKey) -> String {
    let digest = Sha256::digest(public.to_encoded_point(false).as_bytes());
    hex::encode(&digest[..8])
}
