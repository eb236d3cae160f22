//! The bootstrap state machine.
//!
//! One `SessionBootstrap` per client instance walks
//! Idle → AwaitingPeer (initiator) or Idle → Deriving → Established
//! (joiner). The initiator reaches Established when the joiner's key
//! announcement arrives as the first frame on the freshly opened conduit;
//! consuming the token tells the relay, the announcement tells the peer.
//!
//! The announcement travels in plaintext. Public keys need integrity, not
//! secrecy, and the integrity check is end-to-end: a tampered key derives
//! a different `SharedKey`, after which every envelope fails
//! authentication and the session is dead on arrival rather than
//! readable by anyone.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bootstrap::error::{BootstrapError, BootstrapResult};
use crate::crypto::{import_public_key_b64, SessionKeypair, SharedKey};
use crate::relay::{KeyExchange, SessionToken};

/// Phase of the bootstrap state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapPhase {
    /// No exchange in progress; keys may not exist yet.
    #[default]
    Idle,

    /// Token issued, public key published; waiting for the peer's
    /// announcement on the conduit.
    AwaitingPeer,

    /// Peer key in hand, agreement running.
    Deriving,

    /// Shared key handed off. Terminal; `reset` to go again.
    Established,
}

/// The joiner's first frame on the conduit: its public key, so the
/// initiator can derive too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAnnouncement {
    #[serde(rename = "type")]
    tag: AnnouncementTag,

    /// The announcing side's public key, base64-encoded SEC1 point.
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AnnouncementTag {
    Pubkey,
}

impl KeyAnnouncement {
    /// Wraps a public key for announcement.
    #[must_use]
    pub const fn new(key: String) -> Self {
        Self {
            tag: AnnouncementTag::Pubkey,
            key,
        }
    }

    /// Parses a raw transport frame as a key announcement.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::MalformedAnnouncement`] if the frame is
    /// anything else.
    pub fn from_frame(frame: &str) -> BootstrapResult<Self> {
        serde_json::from_str(frame).map_err(|e| BootstrapError::MalformedAnnouncement(e.to_string()))
    }

    /// Serializes this announcement to a transport frame.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Serialization`] on serializer failure
    /// (should not occur for this shape).
    pub fn to_frame(&self) -> BootstrapResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The per-client bootstrap state machine.
///
/// Owns the session keypair; yields the [`SharedKey`] exactly once per
/// established exchange and never stores it — the caller hands it
/// straight to the channel, and dropping the key ends the session.
#[derive(Debug, Default)]
pub struct SessionBootstrap {
    keypair: Option<SessionKeypair>,
    phase: BootstrapPhase,
}

impl SessionBootstrap {
    /// Creates an Idle bootstrap with no key material.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keypair: None,
            phase: BootstrapPhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// This side's public key, once a keypair exists.
    #[must_use]
    pub fn public_key_b64(&self) -> Option<String> {
        self.keypair.as_ref().map(SessionKeypair::public_key_b64)
    }

    /// Initiates an exchange: generate keys, publish the public key,
    /// obtain the single-use token to hand out of band (QR code).
    ///
    /// # Errors
    ///
    /// [`BootstrapError::AlreadyStarted`] outside Idle,
    /// [`BootstrapError::Crypto`] if key generation fails, or a relay
    /// error from `create_session`.
    pub async fn initiate(&mut self, store: &impl KeyExchange) -> BootstrapResult<SessionToken> {
        self.ensure_idle()?;
        let keypair = self.ensure_keypair()?;
        let public_key_b64 = keypair.public_key_b64();
        let key_fingerprint = keypair.fingerprint();

        let token = store.create_session(&public_key_b64).await?;
        self.phase = BootstrapPhase::AwaitingPeer;
        info!(key = %key_fingerprint, "exchange initiated, awaiting peer");
        Ok(token)
    }

    /// Joins an exchange: consume the token, derive the shared key.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::SessionNotFound`] uniformly when the token is
    /// missing, expired or already consumed — never retry the same token;
    /// [`BootstrapError::AlreadyStarted`] outside Idle; crypto errors if
    /// the stored key is malformed. On failure after consumption the
    /// machine returns to Idle, ready for a *new* token.
    pub async fn join(
        &mut self,
        store: &impl KeyExchange,
        token: &SessionToken,
    ) -> BootstrapResult<SharedKey> {
        self.ensure_idle()?;
        self.ensure_keypair()?;

        let peer_key_b64 = store.consume_session(token).await?;
        self.phase = BootstrapPhase::Deriving;

        match self.derive(&peer_key_b64) {
            Ok(shared) => {
                self.phase = BootstrapPhase::Established;
                info!("exchange established (joiner)");
                Ok(shared)
            }
            Err(e) => {
                debug!(error = %e, "derivation failed, returning to idle");
                self.phase = BootstrapPhase::Idle;
                Err(e)
            }
        }
    }

    /// Completes the initiator's exchange from the peer's announcement
    /// frame.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::NotAwaitingPeer`] outside AwaitingPeer;
    /// [`BootstrapError::MalformedAnnouncement`] if the frame is not an
    /// announcement (the machine stays in AwaitingPeer so the caller can
    /// try the next frame); crypto errors for a malformed announced key.
    pub fn complete(&mut self, frame: &str) -> BootstrapResult<SharedKey> {
        if self.phase() != BootstrapPhase::AwaitingPeer {
            return Err(BootstrapError::NotAwaitingPeer);
        }
        let announcement = KeyAnnouncement::from_frame(frame)?;
        self.phase = BootstrapPhase::Deriving;

        match self.derive(&announcement.key) {
            Ok(shared) => {
                self.phase = BootstrapPhase::Established;
                info!("exchange established (initiator)");
                Ok(shared)
            }
            Err(e) => {
                debug!(error = %e, "announced key rejected, still awaiting peer");
                self.phase = BootstrapPhase::AwaitingPeer;
                Err(e)
            }
        }
    }

    /// The announcement frame this side sends as its first frame after
    /// joining.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::Crypto`] if no keypair exists yet and generation
    /// fails.
    pub fn announcement_frame(&mut self) -> BootstrapResult<String> {
        let keypair = self.ensure_keypair()?;
        KeyAnnouncement::new(keypair.public_key_b64()).to_frame()
    }

    /// Discards all key material and returns to Idle. Any previously
    /// derived `SharedKey` is invalid from the protocol's point of view;
    /// the caller must drop it and close its channel.
    pub fn reset(&mut self) {
        self.keypair = None;
        self.phase = BootstrapPhase::Idle;
        info!("bootstrap reset, key material discarded");
    }

    fn ensure_idle(&self) -> BootstrapResult<()> {
        match self.phase() {
            BootstrapPhase::Idle => Ok(()),
            other => Err(BootstrapError::AlreadyStarted(other)),
        }
    }

    fn ensure_keypair(&mut self) -> BootstrapResult<&SessionKeypair> {
        if self.keypair.is_none() {
            self.keypair = Some(SessionKeypair::generate()?);
        }
        // just populated above
        Ok(self.keypair.as_ref().expect("keypair present"))
    }

    fn derive(&self, peer_key_b64: &str) -> BootstrapResult<SharedKey> {
        let peer_public = import_public_key_b64(peer_key_b64)?;
        let keypair = self
            .keypair
            .as_ref()
            .ok_or(BootstrapError::NotAwaitingPeer)?;
        Ok(keypair.derive_shared_key(&peer_public)?)
    }
}
