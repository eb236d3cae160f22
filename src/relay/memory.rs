//! In-memory relay for in-process two-peer tests.
//!
//! Implements the same contract as the production relay — single-use
//! tokens with expiry, opaque frame forwarding — without any network.
//! Available behind the `test-utils` feature only; nothing here belongs
//! in a production build.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::{mpsc, Mutex};

use super::error::{RelayError, RelayResult};
use super::types::SessionToken;
use super::{Conduit, KeyExchange, CONDUIT_BUFFER};

/// Default token time-to-live, matching the production relay's short TTL.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(120);

/// A published key awaiting its single consumer.
struct StoredKey {
    public_key_b64: String,
    stored_at: Instant,
}

/// An in-memory key-exchange store with single-use tokens and expiry.
///
/// # Example
///
/// ```rust,ignore
/// let relay = MemoryRelay::new();
/// let token = relay.create_session("BASE64KEY").await?;
/// let key = relay.consume_session(&token).await?;           // ok
/// let replay = relay.consume_session(&token).await;          // SessionNotFound
/// ```
#[derive(Clone)]
pub struct MemoryRelay {
    sessions: Arc<Mutex<HashMap<String, StoredKey>>>,
    ttl: Duration,
}

impl MemoryRelay {
    /// Creates a store with the default token TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TOKEN_TTL)
    }

    /// Creates a store with a custom token TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyExchange for MemoryRelay {
    async fn create_session(&self, public_key_b64: &str) -> RelayResult<SessionToken> {
        let mut token_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut token_bytes);
        let token = hex::encode(token_bytes);

        self.sessions.lock().await.insert(
            token.clone(),
            StoredKey {
                public_key_b64: public_key_b64.to_string(),
                stored_at: Instant::now(),
            },
        );
        Ok(SessionToken::new(token))
    }

    async fn consume_session(&self, token: &SessionToken) -> RelayResult<String> {
        let mut sessions = self.sessions.lock().await;
        // The entry is removed before the key is returned, so a replay of
        // a consumed token and an expired or unknown token all answer the
        // same way.
        match sessions.remove(token.as_str()) {
            Some(stored) if stored.stored_at.elapsed() < self.ttl => Ok(stored.public_key_b64),
            _ => Err(RelayError::SessionNotFound),
        }
    }
}

/// Creates a conduit pair joined by an echoing forwarder: every frame is
/// delivered to the peer *and* looped back to its sender, imitating naive
/// relays that broadcast to all participants of a session.
#[must_use]
pub fn echo_pair() -> (Conduit, Conduit) {
    let (a_out_tx, mut a_out_rx) = mpsc::channel::<String>(CONDUIT_BUFFER);
    let (b_out_tx, mut b_out_rx) = mpsc::channel::<String>(CONDUIT_BUFFER);
    let (a_in_tx, a_in_rx) = mpsc::channel::<String>(CONDUIT_BUFFER);
    let (b_in_tx, b_in_rx) = mpsc::channel::<String>(CONDUIT_BUFFER);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = a_out_rx.recv() => match frame {
                    Some(f) => {
                        let _ = a_in_tx.send(f.clone()).await;
                        let _ = b_in_tx.send(f).await;
                    }
                    None => break,
                },
                frame = b_out_rx.recv() => match frame {
                    Some(f) => {
                        let _ = b_in_tx.send(f.clone()).await;
                        let _ = a_in_tx.send(f).await;
                    }
                    None => break,
                },
            }
        }
    });

    (
        Conduit::from_pipes(a_out_tx, a_in_rx),
        Conduit::from_pipes(b_out_tx, b_in_rx),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_consume_returns_key() {
        let relay = MemoryRelay::new();
        let token = relay.create_session("PUBKEY").await.unwrap();
        let key = relay.consume_session(&token).await.unwrap();
        assert_eq!(key, "PUBKEY");
    }

    #[tokio::test]
    async fn consumed_token_is_indistinguishable_from_unknown() {
        let relay = MemoryRelay::new();
        let token = relay.create_session("PUBKEY").await.unwrap();
        relay.consume_session(&token).await.unwrap();

        let replay = relay.consume_session(&token).await.unwrap_err();
        let unknown = relay
            .consume_session(&SessionToken::new("never-issued"))
            .await
            .unwrap_err();

        assert_eq!(replay.to_string(), unknown.to_string());
        assert!(matches!(replay, RelayError::SessionNotFound));
        assert!(matches!(unknown, RelayError::SessionNotFound));
    }

    #[tokio::test]
    async fn expired_token_answers_like_unknown() {
        let relay = MemoryRelay::with_ttl(Duration::ZERO);
        let token = relay.create_session("PUBKEY").await.unwrap();
        let result = relay.consume_session(&token).await;
        assert!(matches!(result, Err(RelayError::SessionNotFound)));
    }

    #[tokio::test]
    async fn tokens_are_unique() {
        let relay = MemoryRelay::new();
        let t1 = relay.create_session("KEY1").await.unwrap();
        let t2 = relay.create_session("KEY2").await.unwrap();
        assert_ne!(t1, t2);
    }

    #[tokio::test]
    async fn echo_pair_delivers_to_both_sides() {
        let (a, b) = echo_pair();
        let (a_tx, mut a_rx) = a.split();
        let (_b_tx, mut b_rx) = b.split();

        a_tx.send("frame".to_string()).await.unwrap();

        assert_eq!(a_rx.recv().await.unwrap(), "frame");
        assert_eq!(b_rx.recv().await.unwrap(), "frame");
    }
}
