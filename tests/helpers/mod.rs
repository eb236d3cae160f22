//! Reusable helpers for two-peer integration tests.
//!
//! These run the REAL protocol end to end over the in-memory relay: real
//! P-256 exchange, real AES-256-GCM envelopes, real channel tasks. Each
//! `SessionBootstrap` simulates a separate client with its own key
//! material. No mocking is needed.

#![allow(dead_code)] // not every test binary uses every helper

use rendezvous_core::bootstrap::SessionBootstrap;
use rendezvous_core::channel::{ChannelConfig, ChannelEvent, SecureChannel};
use rendezvous_core::relay::memory::{echo_pair, MemoryRelay};
use rendezvous_core::relay::{Conduit, KeyExchange};
use tokio::sync::mpsc;

/// A fully established two-peer session: both channels and both event
/// streams, ready for traffic.
pub struct PeerPair {
    pub initiator: SecureChannel,
    pub initiator_events: mpsc::Receiver<ChannelEvent>,
    pub joiner: SecureChannel,
    pub joiner_events: mpsc::Receiver<ChannelEvent>,
}

/// Runs the complete bootstrap (initiate, join, announce, complete) over
/// the given relay store and opens both channels over the given conduits.
pub async fn establish_over(
    relay: &impl KeyExchange,
    mut initiator_conduit: Conduit,
    joiner_conduit: Conduit,
) -> PeerPair {
    let mut initiator = SessionBootstrap::new();
    let mut joiner = SessionBootstrap::new();

    let token = initiator
        .initiate(relay)
        .await
        .expect("initiate should succeed");
    let joiner_key = joiner
        .join(relay, &token)
        .await
        .expect("join should succeed");

    // Joiner announces its key as the first frame
    let announcement = joiner
        .announcement_frame()
        .expect("announcement should build");
    joiner_conduit
        .send(announcement)
        .await
        .expect("announcement should send");

    // Initiator completes from frames, skipping anything that is not an
    // announcement (echoing relays may deliver other frames first)
    let initiator_key = loop {
        let frame = initiator_conduit
            .recv()
            .await
            .expect("conduit should stay open during handshake");
        if let Ok(key) = initiator.complete(&frame) {
            break key;
        }
    };

    let config = ChannelConfig::default();
    let (initiator_channel, initiator_events) =
        SecureChannel::open(initiator_key, initiator_conduit, &config)
            .expect("initiator channel should open");
    let (joiner_channel, joiner_events) =
        SecureChannel::open(joiner_key, joiner_conduit, &config)
            .expect("joiner channel should open");

    PeerPair {
        initiator: initiator_channel,
        initiator_events,
        joiner: joiner_channel,
        joiner_events,
    }
}

/// Establishes a pair over directly crossed conduits.
pub async fn establish_pair() -> PeerPair {
    let (initiator_conduit, joiner_conduit) = Conduit::pair();
    establish_over(&MemoryRelay::new(), initiator_conduit, joiner_conduit).await
}

/// Establishes a pair over an echoing relay that loops every frame back
/// to its sender as well as forwarding it.
pub async fn establish_echoing_pair() -> PeerPair {
    let (initiator_conduit, joiner_conduit) = echo_pair();
    establish_over(&MemoryRelay::new(), initiator_conduit, joiner_conduit).await
}
