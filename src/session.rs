//! Scoped connection handles.
//!
//! A [`Session`] owns one connection for one party. Every operation is bounded
//! by its timeout and its failures are attributed to the party and operation.
//! [`Session::close`] consumes the session, so a handle is released at most
//! once; dropping an unclosed session drops the underlying connection.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::config::{Endpoint, Timeouts};
use crate::error::{Error, Operation, Party, Result};
use crate::transport::{Connection, Connector, TransportError};

/// What a connection saw while it was being watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// One message arrived.
    Received(String),
    /// Nothing arrived within the silence window.
    Silent,
    /// A message arrived while silence was expected.
    Unexpected(String),
}

impl Delivery {
    /// The received message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Delivery::Received(text) | Delivery::Unexpected(text) => Some(text),
            Delivery::Silent => None,
        }
    }
}

/// One open connection owned by one party.
#[derive(Debug)]
pub struct Session<C> {
    conn: C,
    party: Party,
    timeouts: Timeouts,
}

impl<C: Connection> Session<C> {
    /// Open a connection for `party`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails and
    /// [`Error::Timeout`] if it does not finish within `timeouts.connect`.
    pub async fn open<K>(
        connector: &K,
        endpoint: &Endpoint,
        party: Party,
        timeouts: Timeouts,
    ) -> Result<Self>
    where
        K: Connector<Connection = C>,
    {
        let conn = bounded(
            party,
            Operation::Connect,
            timeouts.connect,
            connector.connect(endpoint),
        )
        .await?;
        debug!(%party, %endpoint, "connection open");
        Ok(Self {
            conn,
            party,
            timeouts,
        })
    }

    /// The party owning this session.
    #[must_use]
    pub fn party(&self) -> Party {
        self.party
    }

    /// Send one text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Send`] or [`Error::Timeout`].
    pub async fn send(&mut self, text: &str) -> Result<()> {
        bounded(
            self.party,
            Operation::Send,
            self.timeouts.send,
            self.conn.send(text),
        )
        .await?;
        debug!(party = %self.party, bytes = text.len(), "sent");
        Ok(())
    }

    /// Wait for exactly one inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Receive`] or [`Error::Timeout`].
    pub async fn recv(&mut self) -> Result<String> {
        let text = bounded(
            self.party,
            Operation::Recv,
            self.timeouts.recv,
            self.conn.recv(),
        )
        .await?;
        debug!(party = %self.party, bytes = text.len(), "received");
        Ok(text)
    }

    /// Wait for one message if `expect` is set, otherwise watch the silence
    /// window and report whatever arrives as [`Delivery::Unexpected`].
    ///
    /// # Errors
    ///
    /// When a message is expected, fails like [`Session::recv`]. When silence
    /// is expected, only a transport failure is an error ([`Error::Receive`]).
    pub async fn expect_delivery(&mut self, expect: bool) -> Result<Delivery> {
        if expect {
            return self.recv().await.map(Delivery::Received);
        }
        match timeout(self.timeouts.silence, self.conn.recv()).await {
            Err(_) => {
                debug!(party = %self.party, "stayed silent");
                Ok(Delivery::Silent)
            }
            Ok(Ok(received)) => {
                debug!(party = %self.party, bytes = received.len(), "received while silence expected");
                Ok(Delivery::Unexpected(received))
            }
            Ok(Err(e)) => Err(Error::Receive {
                party: self.party,
                reason: e.to_string(),
            }),
        }
    }

    /// Release the connection.
    ///
    /// The close handshake is bounded by the send timeout. A close that does
    /// not finish in time is abandoned and the connection is dropped.
    pub async fn close(mut self) {
        if timeout(self.timeouts.send, self.conn.close()).await.is_err() {
            debug!(party = %self.party, "close timed out, dropping connection");
            return;
        }
        debug!(party = %self.party, "connection closed");
    }
}

async fn bounded<T, F>(party: Party, operation: Operation, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, TransportError>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            let reason = e.to_string();
            Err(match operation {
                Operation::Connect => Error::Connection { party, reason },
                Operation::Send => Error::Send { party, reason },
                Operation::Recv => Error::Receive { party, reason },
            })
        }
        Err(_) => Err(Error::Timeout {
            party,
            operation,
            after: limit,
        }),
    }
}
