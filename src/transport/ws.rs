//! Connections over `tokio-tungstenite`.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use super::{Connection, Connector, TransportError};
use crate::config::Endpoint;

/// Connects to `ws://` endpoints, and to `wss://` endpoints when the
/// `tls-rustls` feature is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<WsConnection, TransportError> {
        if endpoint.is_secure() {
            install_crypto_provider();
        }

        let (stream, response) = connect_async(endpoint.as_str()).await?;
        debug!(endpoint = %endpoint, status = %response.status(), "websocket handshake complete");
        Ok(WsConnection {
            stream,
            closed: false,
        })
    }
}

#[cfg(feature = "tls-rustls")]
fn install_crypto_provider() {
    // Errors when a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[cfg(not(feature = "tls-rustls"))]
fn install_crypto_provider() {}

/// A client connection established by [`WsConnector`].
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connection for WsConnection {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::new("connection already closed"));
        }
        self.stream.send(Message::Text(text.to_owned())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::new("connection already closed"));
        }
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => return Ok(text),
                Message::Binary(data) => {
                    return String::from_utf8(data)
                        .map_err(|_| TransportError::new("binary message is not valid UTF-8"));
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|cf| format!("{} {}", u16::from(cf.code), cf.reason))
                        .unwrap_or_else(|| "no close code".to_string());
                    return Err(TransportError::new(format!("closed by peer ({reason})")));
                }
                // Pings are answered by tungstenite on the next read or write.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Err(TransportError::new("stream ended"))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}
