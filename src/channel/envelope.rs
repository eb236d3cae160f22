//! Envelope framing: the wire unit exchanged over the relay.
//!
//! An envelope is `{"type": kind, "iv": b64, "ciphertext": b64}`. The kind
//! tag rides in the clear so the receiver knows how to interpret the
//! plaintext, but it is also repeated *inside* the ciphertext (the payload
//! is internally tagged); a mismatch between the two is treated as a
//! malformed envelope and dropped, so nobody can relabel a sealed payload
//! in transit.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::types::{PayloadKind, WirePayload};
use crate::crypto::{SharedKey, IV_LEN};

/// The wire unit: kind tag, fresh IV, sealed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Payload family, in the clear.
    #[serde(rename = "type")]
    pub kind: PayloadKind,

    /// The 12-byte IV drawn for this envelope, base64-encoded.
    pub iv: String,

    /// AES-256-GCM ciphertext (tag appended), base64-encoded.
    pub ciphertext: String,
}

impl Envelope {
    /// Seals a wire payload under the session key.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Serialization`] if the payload fails to
    /// serialize, or a [`ChannelError::Crypto`] from the seal itself.
    pub(crate) fn seal(key: &SharedKey, wire: &WirePayload) -> ChannelResult<Self> {
        let plaintext = serde_json::to_vec(wire)?;
        let sealed = key.encrypt(&plaintext)?;
        Ok(Self {
            kind: wire.payload.kind(),
            iv: BASE64.encode(sealed.iv),
            ciphertext: BASE64.encode(&sealed.ciphertext),
        })
    }

    /// Opens this envelope, verifying tag, shape and kind agreement.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::MalformedEnvelope`] for bad base64, a wrong-sized
    ///   IV, a plaintext that fails to parse, a kind mismatch, or payload
    ///   values that fail validation
    /// - [`ChannelError::Crypto`] carrying `AuthenticationFailure` when
    ///   the tag does not verify — nothing about the plaintext is exposed
    ///   in that case
    pub(crate) fn open(&self, key: &SharedKey) -> ChannelResult<WirePayload> {
        let iv_bytes = BASE64
            .decode(&self.iv)
            .map_err(|e| ChannelError::MalformedEnvelope(format!("iv: {e}")))?;
        let iv: [u8; IV_LEN] = iv_bytes
            .try_into()
            .map_err(|_| ChannelError::MalformedEnvelope("iv must be 12 bytes".to_string()))?;

        let ciphertext = BASE64
            .decode(&self.ciphertext)
            .map_err(|e| ChannelError::MalformedEnvelope(format!("ciphertext: {e}")))?;

        let plaintext = key.decrypt(&iv, &ciphertext)?;

        let wire: WirePayload = serde_json::from_slice(&plaintext)
            .map_err(|e| ChannelError::MalformedEnvelope(format!("payload: {e}")))?;

        if wire.payload.kind() != self.kind {
            return Err(ChannelError::MalformedEnvelope(format!(
                "envelope tagged {} but payload is {}",
                self.kind,
                wire.payload.kind()
            )));
        }
        if !wire.payload.is_valid() {
            return Err(ChannelError::MalformedEnvelope(
                "payload failed validation".to_string(),
            ));
        }

        Ok(wire)
    }

    /// Parses a raw transport frame as an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::MalformedEnvelope`] if the frame is not an
    /// envelope-shaped JSON object.
    pub fn from_frame(frame: &str) -> ChannelResult<Self> {
        serde_json::from_str(frame).map_err(|e| ChannelError::MalformedEnvelope(e.to_string()))
    }

    /// Serializes this envelope to a transport frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Serialization`] on serializer failure
    /// (should not occur for this shape).
    pub fn to_frame(&self) -> ChannelResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
