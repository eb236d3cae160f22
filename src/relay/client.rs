//! HTTP + WebSocket client for the production relay.
//!
//! The relay exposes three endpoints, and this client speaks all of them:
//! `POST {base}/create-session`, `GET {base}/get-key/{token}`, and the
//! duplex WebSocket at `{ws_base}/ws/{token}` (same host, `http(s)`
//! swapped for `ws(s)`).

use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};
use url::Url;

use super::error::{RelayError, RelayResult};
use super::types::{
    ConsumeSessionResponse, CreateSessionRequest, CreateSessionResponse, SessionToken,
};
use super::{Conduit, KeyExchange, CONDUIT_BUFFER};

/// Client for the relay's key-exchange store and duplex pipe.
///
/// # Example
///
/// ```rust,ignore
/// use rendezvous_core::relay::{HttpRelay, KeyExchange};
///
/// let relay = HttpRelay::new("https://relay.example.com")?;
/// let token = relay.create_session(&keypair.public_key_b64()).await?;
/// // ...hand the token to the peer via QR, then:
/// let conduit = relay.connect(&token).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpRelay {
    http: reqwest::Client,

    /// Base URL without a trailing slash.
    base_url: String,

    /// Same endpoint with the scheme swapped to ws(s).
    ws_base_url: String,
}

impl HttpRelay {
    /// Creates a client for the relay at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidUrl`] if `base_url` does not parse or
    /// is not `http`/`https`.
    pub fn new(base_url: &str) -> RelayResult<Self> {
        let mut url =
            Url::parse(base_url).map_err(|e| RelayError::InvalidUrl(format!("{base_url}: {e}")))?;

        let ws_scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(RelayError::InvalidUrl(format!(
                    "expected http(s) scheme, got {other}"
                )))
            }
        };

        let base = base_url.trim_end_matches('/').to_string();
        // set_scheme only rejects invalid transitions; http(s)→ws(s) is valid
        url.set_scheme(ws_scheme)
            .map_err(|()| RelayError::InvalidUrl(base_url.to_string()))?;
        let ws_base = url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base,
            ws_base_url: ws_base,
        })
    }

    /// Opens the duplex frame pipe for `token`.
    ///
    /// Spawns two pump tasks that move text frames between the WebSocket
    /// and the returned [`Conduit`]. The pumps end when either side closes;
    /// dropping the conduit's sender half closes the socket.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connection`] if the WebSocket handshake fails.
    pub async fn connect(&self, token: &SessionToken) -> RelayResult<Conduit> {
        let url = format!("{}/ws/{token}", self.ws_base_url);

        let (socket, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| RelayError::Connection {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        info!(url = %url, "relay conduit connected");

        let (mut sink, mut stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(CONDUIT_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<String>(CONDUIT_BUFFER);

        // Outbound pump: conduit -> socket
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Inbound pump: socket -> conduit. Non-text frames are transport
        // noise (pings, pongs) and are not forwarded.
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            debug!("relay conduit inbound pump ended");
        });

        Ok(Conduit::from_pipes(out_tx, in_rx))
    }
}

impl KeyExchange for HttpRelay {
    async fn create_session(&self, public_key_b64: &str) -> RelayResult<SessionToken> {
        let url = format!("{}/create-session", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&CreateSessionRequest {
                key: public_key_b64.to_string(),
            })
            .send()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Http(format!(
                "create-session returned {}",
                response.status()
            )));
        }

        let body: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;
        debug!("relay issued session token");
        Ok(SessionToken::new(body.session))
    }

    async fn consume_session(&self, token: &SessionToken) -> RelayResult<String> {
        let url = format!("{}/get-key/{token}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;

        // Missing, expired and already-consumed all come back as these
        // statuses; collapse them into one indistinguishable error.
        if response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::GONE {
            return Err(RelayError::SessionNotFound);
        }
        if !response.status().is_success() {
            return Err(RelayError::Http(format!(
                "get-key returned {}",
                response.status()
            )));
        }

        let body: ConsumeSessionResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Http(e.to_string()))?;
        Ok(body.key)
    }
}
