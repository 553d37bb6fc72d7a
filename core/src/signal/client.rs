//! Signal client — a peer's long-lived websocket connection to the relay
//!
//! One client per peer, owned by whoever drives the transfer (never shared
//! module state). Text frames carry [`SignalEvent`] JSON; binary frames
//! carry relayed file chunks.

use super::protocol::{ProtocolError, SignalEvent};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A frame received from the relay, already classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A decoded signaling envelope.
    Event(SignalEvent),
    /// Raw file-chunk bytes from the relayed fallback path.
    Chunk(Vec<u8>),
}

/// Signal client error types.
#[derive(Debug, Error)]
pub enum SignalClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Websocket connection to a relay endpoint.
pub struct SignalClient {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl SignalClient {
    /// Connect to a relay. The URL selects the session, e.g.
    /// `ws://host:5000/ws?session=alpha`; without a query the relay puts
    /// the peer in the default session.
    pub async fn connect(url: &str) -> Result<Self, SignalClientError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| SignalClientError::ConnectionFailed(e.to_string()))?;
        debug!(url, "connected to relay");

        let (sink, stream) = ws.split();
        Ok(Self { sink, stream })
    }

    /// Send a signaling envelope as a text frame.
    pub async fn send_event(&mut self, event: &SignalEvent) -> Result<(), SignalClientError> {
        let text = event.to_text()?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| SignalClientError::SendFailed(e.to_string()))
    }

    /// Send file-chunk bytes as a binary frame (relayed fallback path).
    pub async fn send_chunk(&mut self, data: &[u8]) -> Result<(), SignalClientError> {
        self.sink
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| SignalClientError::SendFailed(e.to_string()))
    }

    /// Wait for the next frame from the relay.
    ///
    /// Malformed text frames are warned about and skipped, mirroring the
    /// relay's silent-drop policy. Returns `None` once the connection is
    /// closed.
    pub async fn next(&mut self) -> Option<Inbound> {
        while let Some(result) = self.stream.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "signal stream error, treating as closed");
                    return None;
                }
            };
            match msg {
                Message::Text(text) => match SignalEvent::from_text(&text) {
                    Ok(event) => return Some(Inbound::Event(event)),
                    Err(e) => warn!(error = %e, "discarding malformed signal frame"),
                },
                Message::Binary(data) => return Some(Inbound::Chunk(data)),
                Message::Close(_) => return None,
                // Ping/pong are handled by the transport
                _ => {}
            }
        }
        None
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), SignalClientError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| SignalClientError::SendFailed(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
