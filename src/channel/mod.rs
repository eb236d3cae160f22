//! Secure channel: typed, authenticated payload exchange over an
//! untrusted relay pipe.
//!
//! # Architecture
//!
//! ```text
//! Payload ──seal──▶ Envelope {type, iv, ciphertext} ──frame──▶ Conduit
//!                                                                 │
//! ChannelEvent ◀──dispatch── receive task ◀──parse/open/filter────┘
//! ```
//!
//! The channel enforces, per incoming frame: envelope shape, AEAD tag,
//! payload/kind agreement, payload validity, and self-echo suppression.
//! Any failure drops that one frame and nothing else — a peer (or relay)
//! feeding garbage cannot take the session down, only fail to be heard.

mod envelope;
mod error;
mod secure;
mod types;

pub use envelope::Envelope;
pub use error::{ChannelError, ChannelResult};
pub use secure::SecureChannel;
pub use types::{ChannelConfig, ChannelEvent, LocationFix, Payload, PayloadKind, SenderId};
