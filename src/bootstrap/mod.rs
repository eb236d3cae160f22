//! Session bootstrap: from nothing shared to one shared key.
//!
//! Two previously-unacquainted clients establish an AES-256-GCM key
//! through the relay's single-use token store:
//!
//! ```text
//! initiator                      relay                       joiner
//!   generate keypair
//!   create-session(pubkey) ──▶ token→key
//!   show token as QR  ─ ─ ─ ─ ─ out of band ─ ─ ─ ─ ─ ▶  scan token
//!                                token→key ◀── consume-session(token)
//!                                (invalidated)              derive key
//!   open conduit                                        open conduit
//!   complete(frame) ◀──────── forward ◀──────── announce own pubkey
//!   derive key
//! ```
//!
//! The token is single-use; the relay enforces it and this client treats
//! "already consumed" exactly like "not found" — fail closed, retry only
//! with a brand-new token.

mod error;
mod protocol;

pub use error::{BootstrapError, BootstrapResult};
pub use protocol::{BootstrapPhase, KeyAnnouncement, SessionBootstrap};
