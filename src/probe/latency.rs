//! Round-trip latency and fidelity of a single connection.

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::config::{Config, Endpoint, Timeouts};
use crate::error::{Error, Party, Result};
use crate::payload::{Clock, Stamp, TimingSample, latency_payload};
use crate::session::Session;
use crate::transport::Connector;

/// Sends one stamped payload and times its echo.
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    endpoint: Endpoint,
    threshold: Duration,
    timeouts: Timeouts,
}

/// Outcome of one completed latency probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyReport {
    /// Payload that was sent.
    pub sent: String,
    /// Payload that came back.
    pub received: String,
    /// Measured start and end instants.
    pub timing: TimingSample,
    /// Threshold the round trip was checked against.
    pub threshold: Duration,
    /// Failed checks, in evaluation order.
    pub failures: Vec<Error>,
}

impl LatencyReport {
    /// Measured round-trip time.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.timing.elapsed()
    }

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

impl LatencyProbe {
    /// Create a probe for `endpoint` with default threshold and timeouts.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::from_config(&Config::new(endpoint))
    }

    /// Create a probe from a configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            threshold: config.latency_threshold,
            timeouts: config.timeouts,
        }
    }

    /// Set the maximum allowed round-trip time.
    #[must_use]
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the operation timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Run the probe once.
    ///
    /// Timing covers connect, send, receive and close. The connection is
    /// closed before this returns, whether or not the exchange succeeded.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the failed step ([`Error::Connection`],
    /// [`Error::Send`], [`Error::Receive`] or [`Error::Timeout`]). Failed
    /// checks are not errors here; they are listed in the report.
    pub async fn run<K, C>(&self, connector: &K, clock: &C) -> Result<LatencyReport>
    where
        K: Connector,
        C: Clock,
    {
        let start = Instant::now();
        let sent = latency_payload(Stamp::now(clock));

        let mut session = Session::open(connector, &self.endpoint, Party::Probe, self.timeouts).await?;
        let exchange = async {
            session.send(&sent).await?;
            session.recv().await
        }
        .await;
        session.close().await;
        let received = exchange?;

        let timing = TimingSample::since(start);
        let report = self.check(sent, received, timing);
        info!(
            endpoint = %self.endpoint,
            elapsed_ms = report.elapsed().as_secs_f64() * 1000.0,
            passed = report.passed(),
            "latency probe complete"
        );
        Ok(report)
    }

    fn check(&self, sent: String, received: String, timing: TimingSample) -> LatencyReport {
        let mut failures = Vec::new();

        let elapsed = timing.elapsed();
        if elapsed > self.threshold {
            failures.push(Error::LatencyExceeded {
                elapsed,
                threshold: self.threshold,
            });
        }
        if received != sent {
            failures.push(Error::FidelityMismatch {
                sent: sent.clone(),
                received: received.clone(),
            });
        }

        LatencyReport {
            sent,
            received,
            timing,
            threshold: self.threshold,
            failures,
        }
    }
}
