//! Session orchestration: one context object per sharing session.
//!
//! [`SharingSession`] ties the bootstrap state machine, the secure channel
//! and the session policy (time limit) together, replacing the ambient
//! globals of earlier designs. Nothing here is process-wide: two sessions
//! can run side by side in one process, which is also how the integration
//! tests exercise the whole protocol without a network.
//!
//! # Lifecycle
//!
//! ```text
//! host(store) ──▶ token for the QR          join(store, token)
//!       │                                          │
//!       ▼                                          ▼
//! attach(conduit)  ◀── announcement ──  attach(conduit)
//!       │                                          │
//!       ▼                                          ▼
//!  ChannelEvent stream + send()          ChannelEvent stream + send()
//! ```

mod error;
mod types;

pub use error::{SessionError, SessionResult};
pub use types::SessionConfig;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bootstrap::{BootstrapError, BootstrapPhase, SessionBootstrap};
use crate::channel::{ChannelError, ChannelEvent, LocationFix, Payload, SecureChannel};
use crate::crypto::SharedKey;
use crate::relay::{Conduit, KeyExchange, RelayError, SessionToken};

/// The context object for one two-party sharing session.
///
/// Owns the keypair (via the bootstrap), the derived key (until the
/// channel takes it) and every task the session spawns. Dropping the
/// session aborts its tasks; the shared key is zeroized when the channel
/// goes with it.
pub struct SharingSession {
    config: SessionConfig,
    bootstrap: SessionBootstrap,
    pending_key: Option<SharedKey>,
    channel: Option<SecureChannel>,
    started_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SharingSession {
    /// Creates a session with the given configuration.
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self {
            config,
            bootstrap: SessionBootstrap::new(),
            pending_key: None,
            channel: None,
            started_at: None,
            expires_at: None,
            tasks: Vec::new(),
        }
    }

    /// Initiates an exchange and returns the token to encode as a QR
    /// code. The peer must consume it before it expires; the session then
    /// completes during [`attach`](Self::attach).
    ///
    /// # Errors
    ///
    /// See [`SessionBootstrap::initiate`].
    pub async fn host(&mut self, store: &impl KeyExchange) -> SessionResult<SessionToken> {
        Ok(self.bootstrap.initiate(store).await?)
    }

    /// Joins an exchange from a scanned token and derives the shared key.
    ///
    /// # Errors
    ///
    /// See [`SessionBootstrap::join`]; in particular
    /// [`BootstrapError::SessionNotFound`] ends this attempt for good —
    /// retry only with a freshly scanned token.
    pub async fn join(
        &mut self,
        store: &impl KeyExchange,
        token: &SessionToken,
    ) -> SessionResult<()> {
        let key = self.bootstrap.join(store, token).await?;
        self.pending_key = Some(key);
        Ok(())
    }

    /// Attaches the duplex conduit and opens the secure channel.
    ///
    /// On the joiner side this first announces our public key; on the
    /// initiator side it waits for that announcement (ignoring unrelated
    /// frames) and completes the exchange. Returns the event stream for
    /// the presentation layer.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotEstablished`] before `host`/`join`,
    /// [`SessionError::AlreadyAttached`] on a second call, relay errors if
    /// the conduit dies mid-handshake, and bootstrap/crypto errors from
    /// completing the exchange.
    pub async fn attach(
        &mut self,
        mut conduit: Conduit,
    ) -> SessionResult<mpsc::Receiver<ChannelEvent>> {
        if self.channel.is_some() {
            return Err(SessionError::AlreadyAttached);
        }

        let key = if let Some(key) = self.pending_key.take() {
            // Joiner: the peer cannot derive until it hears our key
            let frame = self.bootstrap.announcement_frame()?;
            conduit.send(frame).await?;
            key
        } else {
            if self.bootstrap.phase() != BootstrapPhase::AwaitingPeer {
                return Err(SessionError::NotEstablished);
            }
            loop {
                let Some(frame) = conduit.recv().await else {
                    return Err(SessionError::Relay(RelayError::Closed));
                };
                match self.bootstrap.complete(&frame) {
                    Ok(key) => break key,
                    Err(BootstrapError::MalformedAnnouncement(_)) => {
                        debug!("ignoring non-announcement frame while awaiting peer key");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let (channel, events) = SecureChannel::open(key, conduit, &self.config.channel)?;

        self.started_at = Some(Utc::now());
        if let Some(limit) = self.config.session_time_limit {
            self.expires_at = chrono::Duration::from_std(limit)
                .ok()
                .map(|d| Utc::now() + d);

            let expiring = channel.clone();
            self.tasks.push(tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                info!("session time limit reached, closing channel");
                expiring.close().await;
            }));
        }

        self.channel = Some(channel);
        Ok(events)
    }

    /// Sends one payload over the established channel.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotEstablished`] before [`attach`](Self::attach);
    /// otherwise see [`SecureChannel::send`].
    pub fn send(&self, payload: &Payload) -> SessionResult<()> {
        let channel = self.channel.as_ref().ok_or(SessionError::NotEstablished)?;
        Ok(channel.send(payload)?)
    }

    /// Consumes a position-sensor subscription: every fix is sealed and
    /// sent independently, so overlapping ticks never share an IV or a
    /// buffer. Backpressure drops the tick (the next fix supersedes it);
    /// channel closure ends the task.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotEstablished`] before [`attach`](Self::attach).
    pub fn pump_locations(&mut self, mut fixes: mpsc::Receiver<LocationFix>) -> SessionResult<()> {
        let channel = self
            .channel
            .as_ref()
            .ok_or(SessionError::NotEstablished)?
            .clone();

        self.tasks.push(tokio::spawn(async move {
            while let Some(fix) = fixes.recv().await {
                match channel.send(&Payload::Location(fix)) {
                    Ok(()) => {}
                    Err(ChannelError::Backpressure) => {
                        debug!("transport busy, dropping location tick");
                    }
                    Err(ChannelError::ChannelClosed) => break,
                    Err(e) => warn!(error = %e, "failed to send location fix"),
                }
            }
            debug!("position subscription ended");
        }));
        Ok(())
    }

    /// The channel handle, for callers that want to clone it into their
    /// own tasks.
    #[must_use]
    pub const fn channel(&self) -> Option<&SecureChannel> {
        self.channel.as_ref()
    }

    /// When the channel was opened.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Whether the configured time limit has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Utc::now() > t)
    }

    /// Closes the channel and stops all session tasks. Idempotent.
    pub async fn close(&mut self) {
        if let Some(channel) = &self.channel {
            channel.close().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Regenerates from scratch: closes everything and discards all key
    /// material, returning the session to Idle for a fresh exchange.
    pub async fn reset(&mut self) {
        self.close().await;
        self.channel = None;
        self.pending_key = None;
        self.started_at = None;
        self.expires_at = None;
        self.bootstrap.reset();
    }
}

impl Drop for SharingSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SharingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharingSession")
            .field("phase", &self.bootstrap.phase())
            .field("attached", &self.channel.is_some())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
