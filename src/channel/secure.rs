//! The secure channel: a typed, authenticated event stream over an open
//! conduit.
//!
//! One receive task parses, decrypts and dispatches inbound frames; sends
//! happen inline in the caller's context. Both directions share the
//! [`SharedKey`] without locking — AEAD seal and open are stateless pure
//! functions of (key, iv, data), and every send draws its own IV.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::envelope::Envelope;
use crate::channel::error::{ChannelError, ChannelResult};
use crate::channel::types::{ChannelConfig, ChannelEvent, Payload, SenderId, WirePayload};
use crate::crypto::{CryptoError, SharedKey};
use crate::relay::Conduit;

/// A duplex encrypted channel bound to one [`SharedKey`].
///
/// Cheap to clone; clones share the key, the transport and the close
/// state, so a position-subscription task and a chat handler can send
/// concurrently. Dropping the last clone closes the outbound pipe.
///
/// # Example
///
/// ```rust,ignore
/// let (channel, mut events) = SecureChannel::open(shared_key, conduit, &config)?;
/// channel.send(&Payload::location(52.52, 13.405))?;
/// while let Some(event) = events.recv().await {
///     match event {
///         ChannelEvent::Payload(payload) => ui.apply(payload),
///         ChannelEvent::Degraded { .. } => ui.warn_desync(),
///         ChannelEvent::Closed => break,
///     }
/// }
/// ```
#[derive(Clone)]
pub struct SecureChannel {
    key: Arc<SharedKey>,
    sender_id: SenderId,
    frames: mpsc::Sender<String>,
    events: mpsc::Sender<ChannelEvent>,
    peer_name: Arc<RwLock<Option<String>>>,
    closed: Arc<AtomicBool>,
    recv_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SecureChannel {
    /// Opens the channel over an established key and conduit, spawning
    /// the receive task.
    ///
    /// Returns the send handle and the event stream for the presentation
    /// layer.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Crypto`] if the OS RNG cannot produce the
    /// session's sender tag.
    pub fn open(
        key: SharedKey,
        conduit: Conduit,
        config: &ChannelConfig,
    ) -> ChannelResult<(Self, mpsc::Receiver<ChannelEvent>)> {
        let sender_id = SenderId::generate()?;
        let key = Arc::new(key);
        let peer_name = Arc::new(RwLock::new(None));
        let closed = Arc::new(AtomicBool::new(false));

        let (frames_tx, frames_rx) = conduit.split();
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);

        let task = tokio::spawn(receive_loop(
            Arc::clone(&key),
            sender_id.clone(),
            frames_rx,
            events_tx.clone(),
            Arc::clone(&peer_name),
            Arc::clone(&closed),
            config.auth_failure_alert_threshold,
        ));

        Ok((
            Self {
                key,
                sender_id,
                frames: frames_tx,
                events: events_tx,
                peer_name,
                closed,
                recv_task: Arc::new(Mutex::new(Some(task))),
            },
            events_rx,
        ))
    }

    /// Seals a payload and enqueues the frame, without blocking.
    ///
    /// Each call serializes, draws a fresh IV and encrypts independently;
    /// overlapping calls from concurrent tasks never share state.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::ChannelClosed`] after [`close`](Self::close) or
    ///   once the transport is gone
    /// - [`ChannelError::Backpressure`] when the transport queue is full;
    ///   the payload is dropped, the caller may retry
    /// - [`ChannelError::Serialization`] / [`ChannelError::Crypto`] from
    ///   the seal
    pub fn send(&self, payload: &Payload) -> ChannelResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::ChannelClosed);
        }

        let wire = WirePayload {
            payload: payload.clone(),
            sender: self.sender_id.clone(),
        };
        let frame = Envelope::seal(&self.key, &wire)?.to_frame()?;

        self.frames.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Backpressure,
            TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }

    /// The peer's display name, once an `identity` payload has arrived.
    pub async fn peer_name(&self) -> Option<String> {
        self.peer_name.read().await.clone()
    }

    /// Closes the channel: subsequent sends fail with
    /// [`ChannelError::ChannelClosed`], the receive task is stopped, and
    /// one final [`ChannelEvent::Closed`] is emitted. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.recv_task.lock().await.take() {
            task.abort();
        }
        let _ = self.events.try_send(ChannelEvent::Closed);
        info!("secure channel closed");
    }

    /// Whether [`close`](Self::close) has been called or the transport
    /// ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Parses, decrypts, filters and dispatches inbound frames until the
/// transport ends. Every failure drops exactly one frame; none of them
/// stops the loop.
async fn receive_loop(
    key: Arc<SharedKey>,
    local: SenderId,
    mut frames: mpsc::Receiver<String>,
    events: mpsc::Sender<ChannelEvent>,
    peer_name: Arc<RwLock<Option<String>>>,
    closed: Arc<AtomicBool>,
    alert_threshold: u32,
) {
    let mut auth_failures = 0u32;

    while let Some(frame) = frames.recv().await {
        let envelope = match Envelope::from_frame(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "dropping malformed frame");
                continue;
            }
        };

        let wire = match envelope.open(&key) {
            Ok(wire) => wire,
            Err(ChannelError::Crypto(CryptoError::AuthenticationFailure)) => {
                auth_failures += 1;
                warn!(auth_failures, kind = %envelope.kind, "dropping envelope that failed authentication");
                if auth_failures == alert_threshold {
                    let _ = events.send(ChannelEvent::Degraded { auth_failures }).await;
                }
                continue;
            }
            Err(e) => {
                debug!(error = %e, kind = %envelope.kind, "dropping undecodable envelope");
                continue;
            }
        };

        // Naive relays echo frames back to their sender; our own tag
        // means this is not peer data.
        if wire.sender.matches(&local) {
            debug!(kind = %envelope.kind, "suppressing self-echoed envelope");
            continue;
        }

        // The first identity pins the peer name for the session.
        if let Payload::Identity { name } = &wire.payload {
            let mut guard = peer_name.write().await;
            match guard.as_deref() {
                None => {
                    info!(peer = %name, "peer identity established");
                    *guard = Some(name.clone());
                }
                Some(existing) if existing != name => {
                    warn!(existing = %existing, claimed = %name, "dropping conflicting peer identity");
                    continue;
                }
                Some(_) => {}
            }
        }

        if events.send(ChannelEvent::Payload(wire.payload)).await.is_err() {
            // Presentation layer went away; nothing left to deliver to
            return;
        }
    }

    // Transport ended. close() already announced Closed if it ran first.
    if !closed.swap(true, Ordering::AcqRel) {
        let _ = events.send(ChannelEvent::Closed).await;
        info!("transport ended, channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::CONDUIT_BUFFER;

    fn test_key_pair() -> (SharedKey, SharedKey) {
        let bytes = [0x5A; 32];
        (SharedKey::from_bytes(bytes), SharedKey::from_bytes(bytes))
    }

    fn open_linked_pair() -> (
        SecureChannel,
        mpsc::Receiver<ChannelEvent>,
        SecureChannel,
        mpsc::Receiver<ChannelEvent>,
    ) {
        let (key_a, key_b) = test_key_pair();
        let (conduit_a, conduit_b) = Conduit::pair();
        let config = ChannelConfig::default();
        let (a, a_events) = SecureChannel::open(key_a, conduit_a, &config).unwrap();
        let (b, b_events) = SecureChannel::open(key_b, conduit_b, &config).unwrap();
        (a, a_events, b, b_events)
    }

    #[tokio::test]
    async fn payload_crosses_between_channels() {
        let (a, _a_events, _b, mut b_events) = open_linked_pair();

        a.send(&Payload::location(1.0, 2.0)).unwrap();

        let event = b_events.recv().await.unwrap();
        assert_eq!(event, ChannelEvent::Payload(Payload::location(1.0, 2.0)));
    }

    #[tokio::test]
    async fn malformed_frame_does_not_stop_the_channel() {
        let (key_a, key_b) = test_key_pair();
        let (conduit_a, conduit_b) = Conduit::pair();
        let config = ChannelConfig::default();

        let (a_tx, a_rx) = conduit_a.split();
        let (_b, mut b_events) =
            SecureChannel::open(key_b, conduit_b, &config).unwrap();

        a_tx.send("{ not an envelope".to_string()).await.unwrap();

        // A valid envelope after the garbage still arrives
        let (a, _a_events) =
            SecureChannel::open(key_a, Conduit::from_pipes(a_tx, a_rx), &config).unwrap();
        a.send(&Payload::Message {
            text: "still here".to_string(),
        })
        .unwrap();

        let event = b_events.recv().await.unwrap();
        assert_eq!(
            event,
            ChannelEvent::Payload(Payload::Message {
                text: "still here".to_string()
            })
        );
    }

    #[tokio::test]
    async fn send_after_close_reports_channel_closed() {
        let (a, _a_events, _b, _b_events) = open_linked_pair();

        a.close().await;
        let result = a.send(&Payload::location(0.0, 0.0));
        assert!(matches!(result, Err(ChannelError::ChannelClosed)));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_emits_one_closed_event() {
        let (a, mut a_events, _b, _b_events) = open_linked_pair();

        a.close().await;
        a.close().await;

        assert_eq!(a_events.recv().await.unwrap(), ChannelEvent::Closed);
        // Second close produced nothing further
        assert!(a_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn peer_disconnect_emits_closed() {
        let (a, _a_events, b, mut b_events) = open_linked_pair();

        drop(a);
        b.send(&Payload::location(0.0, 0.0)).ok();

        // The a-side conduit is gone; b's receive loop observes the end
        loop {
            match b_events.recv().await.unwrap() {
                ChannelEvent::Closed => break,
                _ => continue,
            }
        }
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn wrong_key_traffic_degrades_after_threshold() {
        let (key_a, _) = test_key_pair();
        let wrong_key = SharedKey::from_bytes([0x11; 32]);
        let (conduit_a, conduit_b) = Conduit::pair();
        let config = ChannelConfig {
            auth_failure_alert_threshold: 2,
            ..ChannelConfig::default()
        };

        let (a, _a_events) = SecureChannel::open(key_a, conduit_a, &config).unwrap();
        let (_b, mut b_events) = SecureChannel::open(wrong_key, conduit_b, &config).unwrap();

        a.send(&Payload::location(1.0, 1.0)).unwrap();
        a.send(&Payload::location(2.0, 2.0)).unwrap();

        let event = b_events.recv().await.unwrap();
        assert_eq!(event, ChannelEvent::Degraded { auth_failures: 2 });
    }

    #[tokio::test]
    async fn peer_name_is_pinned_by_first_identity() {
        let (a, _a_events, b, mut b_events) = open_linked_pair();

        a.send(&Payload::Identity {
            name: "ada".to_string(),
        })
        .unwrap();
        assert_eq!(
            b_events.recv().await.unwrap(),
            ChannelEvent::Payload(Payload::Identity {
                name: "ada".to_string()
            })
        );
        assert_eq!(b.peer_name().await, Some("ada".to_string()));

        // A conflicting rename is dropped, not delivered
        a.send(&Payload::Identity {
            name: "mallory".to_string(),
        })
        .unwrap();
        a.send(&Payload::Message {
            text: "after".to_string(),
        })
        .unwrap();

        assert_eq!(
            b_events.recv().await.unwrap(),
            ChannelEvent::Payload(Payload::Message {
                text: "after".to_string()
            })
        );
        assert_eq!(b.peer_name().await, Some("ada".to_string()));
    }

    #[tokio::test]
    async fn concurrent_sends_from_clones_all_arrive() {
        let (a, _a_events, _b, mut b_events) = open_linked_pair();

        let mut handles = Vec::new();
        for i in 0..(CONDUIT_BUFFER / 2) {
            let sender = a.clone();
            #[allow(clippy::cast_precision_loss)]
            handles.push(tokio::spawn(async move {
                sender.send(&Payload::location(i as f64, 0.0)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut received = 0;
        while received < CONDUIT_BUFFER / 2 {
            if let ChannelEvent::Payload(Payload::Location(_)) = b_events.recv().await.unwrap() {
                received += 1;
            }
        }
    }
}
