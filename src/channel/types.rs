//! Payload and event types for the secure channel.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::crypto::{CryptoError, Result as CryptoResult};

/// Discriminates the three payload families an envelope may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// A position fix.
    Location,
    /// The sender's display name.
    Identity,
    /// Chat text.
    Message,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Location => "location",
            Self::Identity => "identity",
            Self::Message => "message",
        };
        f.write_str(label)
    }
}

/// A position fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude, -90.0 to 90.0.
    pub lat: f64,
    /// Longitude, -180.0 to 180.0.
    pub lon: f64,
}

impl LocationFix {
    /// Creates a fix, clamping non-finite or out-of-range coordinates to
    /// 0.0 (equator / prime meridian) so corrupted sensor readings never
    /// propagate.
    ///
    /// # Examples
    ///
    /// ```
    /// use rendezvous_core::channel::LocationFix;
    ///
    /// let fix = LocationFix::new(52.52, 13.405);
    /// assert_eq!(fix.lat, 52.52);
    ///
    /// let clamped = LocationFix::new(91.0, 13.405);
    /// assert_eq!(clamped.lat, 0.0);
    /// ```
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        let lat = if lat.is_finite() && (-90.0..=90.0).contains(&lat) {
            lat
        } else {
            0.0
        };
        let lon = if lon.is_finite() && (-180.0..=180.0).contains(&lon) {
            lon
        } else {
            0.0
        };
        Self { lat, lon }
    }

    /// Whether both coordinates are finite and in range. Used on the
    /// receive path, where an out-of-range fix means a malformed payload
    /// rather than a reading to repair.
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// A plaintext payload, in the exact shape the presentation layer speaks:
/// `{"kind":"location","lat":..,"lon":..}`, `{"kind":"identity","name":..}`
/// or `{"kind":"message","text":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    /// A position fix.
    Location(LocationFix),
    /// The sender's display name.
    Identity {
        /// Display name to show next to the peer marker.
        name: String,
    },
    /// Chat text.
    Message {
        /// The message body.
        text: String,
    },
}

impl Payload {
    /// Convenience constructor for a location payload (clamping, see
    /// [`LocationFix::new`]).
    #[must_use]
    pub fn location(lat: f64, lon: f64) -> Self {
        Self::Location(LocationFix::new(lat, lon))
    }

    /// The kind tag this payload must travel under.
    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Location(_) => PayloadKind::Location,
            Self::Identity { .. } => PayloadKind::Identity,
            Self::Message { .. } => PayloadKind::Message,
        }
    }

    /// Receive-path validation: decrypted payloads that parse but carry
    /// nonsense are dropped as malformed, not delivered.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Location(fix) => fix.is_in_range(),
            Self::Identity { name } => !name.is_empty(),
            Self::Message { .. } => true,
        }
    }
}

/// A random per-session tag identifying this side's outgoing payloads.
///
/// Travels only inside the ciphertext. Its single purpose is self-echo
/// suppression on relays that broadcast frames back to their sender; it is
/// not an authentication mechanism (the AEAD tag is).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    /// Draws a fresh 8-byte random tag from the OS RNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Unavailable`] when the OS RNG cannot be read.
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::Unavailable(e.to_string()))?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Constant-time comparison against the tag of an incoming payload.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

/// The plaintext actually sealed into an envelope: the payload plus the
/// sender tag, which is stripped again before events reach the
/// presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WirePayload {
    /// The payload in presentation-layer shape.
    #[serde(flatten)]
    pub payload: Payload,

    /// The sealing side's per-session tag.
    pub sender: SenderId,
}

/// Decrypted, authenticated events the channel delivers to the
/// presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A payload from the peer.
    Payload(Payload),

    /// Authentication failures reached the configured threshold: the peer
    /// connection may be compromised or desynced. The channel keeps
    /// running; surfacing this is the UI's call.
    Degraded {
        /// Failures observed so far on this channel.
        auth_failures: u32,
    },

    /// The transport ended; no further events will arrive.
    Closed,
}

/// Tunables for a [`SecureChannel`](crate::channel::SecureChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Emit [`ChannelEvent::Degraded`] once this many envelopes have
    /// failed authentication.
    pub auth_failure_alert_threshold: u32,

    /// Buffered events between the receive task and the presentation
    /// layer.
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            auth_failure_alert_threshold: 3,
            event_buffer: 32,
        }
    }
}
