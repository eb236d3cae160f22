//! Relay transport: the untrusted rendezvous point between two peers.
//!
//! The relay does two things and sees nothing. Its key-exchange store maps
//! a single-use token to one published public key ([`KeyExchange`]), and
//! its duplex pipe forwards opaque frames between the two holders of a
//! token ([`Conduit`]). Every payload is sealed before it reaches either,
//! so a malicious relay can drop or replay traffic but never read or forge
//! it.
//!
//! # Architecture
//!
//! ```text
//! SecureChannel ──frames──▶ Conduit ──▶ relay ──▶ Conduit ──▶ SecureChannel
//!                              ▲                     ▲
//!                     HttpRelay::connect      (peer's client)
//! ```
//!
//! Two implementations of the contract ship with the crate: [`HttpRelay`]
//! speaks the production relay's HTTP + WebSocket wire format, and
//! `MemoryRelay` (behind the `test-utils` feature) provides an in-process
//! relay for two-peer tests, including a frame-echoing variant that
//! imitates naive relays which broadcast to all participants.

mod client;
mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
mod types;

pub use client::HttpRelay;
pub use error::{RelayError, RelayResult};
pub use types::{
    ConsumeSessionResponse, CreateSessionRequest, CreateSessionResponse, SessionToken,
};

use tokio::sync::mpsc;

/// Buffered frames per direction on a [`Conduit`].
///
/// Bounds memory under a stalled transport; senders see backpressure
/// rather than unbounded buffering of sealed frames.
pub const CONDUIT_BUFFER: usize = 32;

/// The relay's short-lived key-exchange store.
///
/// `create_session` publishes a public key under a fresh single-use token;
/// `consume_session` retrieves and invalidates it. The store enforces
/// single consumption and expiry server-side; clients must treat a
/// consumed token exactly like an unknown one and never retry it.
#[allow(async_fn_in_trait)] // consumed generically by the bootstrap, never boxed
pub trait KeyExchange {
    /// Publishes a public key, returning the token to hand out of band.
    async fn create_session(&self, public_key_b64: &str) -> RelayResult<SessionToken>;

    /// Consumes a token, returning the public key stored under it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionNotFound`] for missing, expired and
    /// already-consumed tokens alike.
    async fn consume_session(&self, token: &SessionToken) -> RelayResult<String>;
}

/// An open duplex frame pipe to the peer, addressed by a session token.
///
/// The pipe carries opaque text frames; sealing happened before frames get
/// here. Implementations pump frames between this pair of channels and the
/// real transport (a WebSocket in production, crossed channels in tests).
#[derive(Debug)]
pub struct Conduit {
    /// Frames headed to the peer.
    outbound: mpsc::Sender<String>,

    /// Frames arriving from the peer.
    inbound: mpsc::Receiver<String>,
}

impl Conduit {
    /// Assembles a conduit from its two directions.
    #[must_use]
    pub const fn from_pipes(
        outbound: mpsc::Sender<String>,
        inbound: mpsc::Receiver<String>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Creates a directly crossed pair: frames sent on one end arrive at
    /// the other, with no relay in between.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(CONDUIT_BUFFER);
        let (b_tx, a_rx) = mpsc::channel(CONDUIT_BUFFER);
        (Self::from_pipes(a_tx, a_rx), Self::from_pipes(b_tx, b_rx))
    }

    /// Sends one frame, waiting for space in the pipe.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Closed`] once the transport is gone.
    pub async fn send(&self, frame: String) -> RelayResult<()> {
        self.outbound.send(frame).await.map_err(|_| RelayError::Closed)
    }

    /// Receives the next frame; `None` when the transport ended.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Splits into the send and receive halves so they can be driven
    /// concurrently. The sender half is cheap to clone.
    #[must_use]
    pub fn split(self) -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        (self.outbound, self.inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_crosses_frames() {
        let (a, b) = Conduit::pair();
        let (a_tx, _a_rx) = a.split();
        let (_b_tx, mut b_rx) = b.split();

        a_tx.send("hello".to_string()).await.unwrap();
        assert_eq!(b_rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn dropped_end_closes_the_pipe() {
        let (a, b) = Conduit::pair();
        drop(a);
        let (_b_tx, mut b_rx) = b.split();
        assert!(b_rx.recv().await.is_none());
    }
}
