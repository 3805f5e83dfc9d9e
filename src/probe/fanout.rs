//! Delivery of one message across two simultaneously connected clients.

use tracing::{info, warn};

use crate::config::{Config, Endpoint, FanOut, Timeouts};
use crate::error::{Error, Party, Result};
use crate::payload::{Clock, Stamp, fan_out_payload};
use crate::session::{Delivery, Session};
use crate::transport::{Connection, Connector};

/// Connects A and B, sends from A, and checks who receives the message.
#[derive(Debug, Clone)]
pub struct FanOutVerifier {
    endpoint: Endpoint,
    expected: FanOut,
    timeouts: Timeouts,
}

/// Outcome of one completed fan-out verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    /// Payload sent by A.
    pub payload: String,
    /// What A saw.
    pub sender: Delivery,
    /// What B saw.
    pub peer: Delivery,
    /// Failed checks, in evaluation order.
    pub failures: Vec<Error>,
}

impl FanOutReport {
    /// Whether every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert failed checks into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checks`] with every failed check.
    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(Error::Checks(self.failures))
        }
    }
}

impl FanOutVerifier {
    /// Create a verifier expecting self-echo and relay.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::from_config(&Config::new(endpoint))
    }

    /// Create a verifier from a configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            expected: config.fan_out,
            timeouts: config.timeouts,
        }
    }

    /// Set the expected delivery pattern.
    #[must_use]
    pub fn with_expected(mut self, expected: FanOut) -> Self {
        self.expected = expected;
        self
    }

    /// Set the operation timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Run the verification once.
    ///
    /// Both connections are opened concurrently and both receives are awaited
    /// concurrently. Every connection that was opened is closed before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the failed step, naming the party it
    /// happened on. If both receives fail, A's error is returned. Failed
    /// checks, including a delivery to a party expected to stay silent, are
    /// listed in the report.
    pub async fn run<K, C>(&self, connector: &K, clock: &C) -> Result<FanOutReport>
    where
        K: Connector,
        C: Clock,
    {
        let (sender, peer) = tokio::join!(
            Session::open(connector, &self.endpoint, Party::Sender, self.timeouts),
            Session::open(connector, &self.endpoint, Party::Peer, self.timeouts),
        );
        let (mut sender, mut peer) = match (sender, peer) {
            (Ok(sender), Ok(peer)) => (sender, peer),
            (Err(e), Ok(peer)) => {
                peer.close().await;
                return Err(e);
            }
            (Ok(sender), Err(e)) => {
                sender.close().await;
                return Err(e);
            }
            (Err(e), Err(other)) => {
                warn!(error = %other, "peer connection failed too");
                return Err(e);
            }
        };

        let payload = fan_out_payload(Stamp::now(clock));
        if let Err(e) = sender.send(&payload).await {
            release(sender, peer).await;
            return Err(e);
        }

        let (sent_back, relayed) = tokio::join!(
            sender.expect_delivery(self.expected.self_echo),
            peer.expect_delivery(self.expected.relay),
        );
        release(sender, peer).await;

        let (sender, peer) = match (sent_back, relayed) {
            (Ok(sender), Ok(peer)) => (sender, peer),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
            (Err(e), Err(other)) => {
                warn!(error = %other, "peer receive failed too");
                return Err(e);
            }
        };

        let report = check(payload, sender, peer);
        info!(
            endpoint = %self.endpoint,
            sender = ?report.sender,
            peer = ?report.peer,
            passed = report.passed(),
            "fan-out verification complete"
        );
        Ok(report)
    }
}

async fn release<T: Connection>(sender: Session<T>, peer: Session<T>) {
    tokio::join!(sender.close(), peer.close());
}

fn check(payload: String, sender: Delivery, peer: Delivery) -> FanOutReport {
    let mut failures = Vec::new();

    match &sender {
        Delivery::Received(received) if *received != payload => {
            failures.push(Error::SelfEchoMismatch {
                expected: payload.clone(),
                received: received.clone(),
            });
        }
        Delivery::Unexpected(received) => failures.push(Error::UnexpectedDelivery {
            party: Party::Sender,
            received: received.clone(),
        }),
        _ => {}
    }
    match &peer {
        Delivery::Received(received) if *received != payload => {
            failures.push(Error::RelayMismatch {
                expected: payload.clone(),
                received: received.clone(),
            });
        }
        Delivery::Unexpected(received) => failures.push(Error::UnexpectedDelivery {
            party: Party::Peer,
            received: received.clone(),
        }),
        _ => {}
    }

    FanOutReport {
        payload,
        sender,
        peer,
        failures,
    }
}
