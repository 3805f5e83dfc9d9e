//! The connection capability probes are written against.
//!
//! A [`Connector`] opens [`Connection`]s to an [`Endpoint`]. Implementations
//! only move text; timeouts and error attribution live in the session layer.

mod memory;
mod ws;

use std::future::Future;

use thiserror::Error;

use crate::config::Endpoint;

pub use memory::{HubOptions, HubStats, MemoryConnection, MemoryHub};
pub use ws::{WsConnection, WsConnector};

/// Failure reported by a connection implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    /// Create an error from a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The diagnostic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self(err.to_string())
    }
}

/// Opens connections to an endpoint.
pub trait Connector: Send + Sync {
    /// Connection type produced by this connector.
    type Connection: Connection;

    /// Perform the opening handshake.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// One open duplex text channel.
pub trait Connection: Send {
    /// Send one text message.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next text message.
    ///
    /// Control traffic is skipped. A close from the remote side or the end of
    /// the stream is an error.
    fn recv(&mut self) -> impl Future<Output = Result<String, TransportError>> + Send;

    /// Release the connection.
    ///
    /// Idempotent; failures while closing are not reported.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
