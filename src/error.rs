//! Error types for probe scenarios.
//!
//! Transport failures are attributed to the party and operation they happened
//! in; check failures carry the values that were compared.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The connection a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Party {
    /// The single connection of the latency probe.
    Probe,
    /// Connection A of the fan-out verifier, the one that sends.
    Sender,
    /// Connection B of the fan-out verifier, which only listens.
    Peer,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Probe => f.write_str("probe"),
            Party::Sender => f.write_str("A"),
            Party::Peer => f.write_str("B"),
        }
    }
}

/// A bounded network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Opening handshake.
    Connect,
    /// Sending one text message.
    Send,
    /// Waiting for one inbound message.
    Recv,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Connect => f.write_str("connect"),
            Operation::Send => f.write_str("send"),
            Operation::Recv => f.write_str("recv"),
        }
    }
}

/// Errors that fail a probe scenario.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The opening handshake did not complete.
    #[error("Connection {party} failed: {reason}")]
    Connection {
        /// Connection that failed to open.
        party: Party,
        /// Transport diagnostic.
        reason: String,
    },

    /// Transport failure while sending.
    #[error("Send on {party} failed: {reason}")]
    Send {
        /// Connection the send was issued on.
        party: Party,
        /// Transport diagnostic.
        reason: String,
    },

    /// Transport failure while receiving.
    #[error("Receive on {party} failed: {reason}")]
    Receive {
        /// Connection the receive was issued on.
        party: Party,
        /// Transport diagnostic.
        reason: String,
    },

    /// A network operation exceeded its bound.
    #[error("{operation} on {party} timed out after {} ms", .after.as_millis())]
    Timeout {
        /// Connection the operation ran on.
        party: Party,
        /// Operation that timed out.
        operation: Operation,
        /// Configured bound.
        after: Duration,
    },

    /// The round trip succeeded but took longer than allowed.
    #[error(
        "Latency is too high: {:.2} ms (threshold: {} ms)",
        .elapsed.as_secs_f64() * 1000.0,
        .threshold.as_millis()
    )]
    LatencyExceeded {
        /// Measured round-trip time.
        elapsed: Duration,
        /// Maximum allowed round-trip time.
        threshold: Duration,
    },

    /// The echoed payload differs from the one sent.
    #[error("Received content does not match the sent content: sent {sent:?}, received {received:?}")]
    FidelityMismatch {
        /// Payload that was sent.
        sent: String,
        /// Payload that came back.
        received: String,
    },

    /// The sender did not get its own message echoed back unchanged.
    #[error("Sender echo mismatch: expected {expected:?}, received {received:?}")]
    SelfEchoMismatch {
        /// Payload the sender sent.
        expected: String,
        /// Payload the sender received.
        received: String,
    },

    /// The peer did not get the sender's message relayed unchanged.
    #[error("Relay mismatch: expected {expected:?}, received {received:?}")]
    RelayMismatch {
        /// Payload the sender sent.
        expected: String,
        /// Payload the peer received.
        received: String,
    },

    /// A connection expected to stay silent received a message.
    #[error("Unexpected delivery on {party}: {received:?}")]
    UnexpectedDelivery {
        /// Connection that received the message.
        party: Party,
        /// Message that arrived.
        received: String,
    },

    /// One or more independent checks failed.
    #[error("{} check(s) failed: {}", .0.len(), join(.0))]
    Checks(Vec<Error>),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn join(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Returns `true` for failures of the network exchange itself, as opposed
    /// to failed checks on a completed exchange.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. }
                | Error::Send { .. }
                | Error::Receive { .. }
                | Error::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::LatencyExceeded {
            elapsed: Duration::from_micros(2_500_250),
            threshold: Duration::from_millis(2000),
        };
        assert_eq!(
            err.to_string(),
            "Latency is too high: 2500.25 ms (threshold: 2000 ms)"
        );

        let err = Error::Timeout {
            party: Party::Sender,
            operation: Operation::Recv,
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "recv on A timed out after 5000 ms");
    }

    #[test]
    fn test_checks_display_lists_every_failure() {
        let err = Error::Checks(vec![
            Error::LatencyExceeded {
                elapsed: Duration::from_millis(3000),
                threshold: Duration::from_millis(2000),
            },
            Error::FidelityMismatch {
                sent: "a".into(),
                received: "b".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 check(s) failed: "));
        assert!(text.contains("3000.00 ms"));
        assert!(text.contains("sent \"a\", received \"b\""));
    }

    #[test]
    fn test_transport_classification() {
        let timeout = Error::Timeout {
            party: Party::Probe,
            operation: Operation::Connect,
            after: Duration::from_secs(1),
        };
        assert!(timeout.is_transport());
        assert!(!Error::Config("x".into()).is_transport());
        assert!(
            !Error::RelayMismatch {
                expected: "a".into(),
                received: "b".into()
            }
            .is_transport()
        );
    }
}
