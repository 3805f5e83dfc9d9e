//! Stamped probe payloads and the clocks they are built from.
//!
//! Each payload embeds a wall-clock reading so that an exact string comparison
//! of the echo also detects content altered in transit.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Prefix of the latency probe payload.
pub const LATENCY_GREETING: &str = "Hello Gemini QA Project, Sent at: ";

/// Prefix of the fan-out verifier payload.
pub const FAN_OUT_GREETING: &str = "Hello Client B, I am A. Time: ";

/// Source of wall-clock readings embedded into payloads.
pub trait Clock: Send + Sync {
    /// Time elapsed since the Unix epoch.
    fn since_epoch(&self) -> Duration;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn since_epoch(&self) -> Duration {
        // A clock set before 1970 yields a zero stamp rather than an error.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock frozen at one reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(Duration);

impl FixedClock {
    /// Freeze the clock at `since_epoch`.
    #[must_use]
    pub const fn new(since_epoch: Duration) -> Self {
        Self(since_epoch)
    }
}

impl Clock for FixedClock {
    fn since_epoch(&self) -> Duration {
        self.0
    }
}

/// Epoch seconds rounded to microsecond precision.
///
/// Renders as `<secs>.<micros>` with exactly six fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp {
    secs: u64,
    micros: u32,
}

impl Stamp {
    /// Round `since_epoch` to the nearest microsecond.
    #[must_use]
    pub fn from_epoch(since_epoch: Duration) -> Self {
        let mut secs = since_epoch.as_secs();
        let mut micros = (since_epoch.subsec_nanos() + 500) / 1000;
        if micros == 1_000_000 {
            secs += 1;
            micros = 0;
        }
        Self { secs, micros }
    }

    /// Read `clock` and round the reading.
    #[must_use]
    pub fn now(clock: &impl Clock) -> Self {
        Self::from_epoch(clock.since_epoch())
    }

    /// The rounded reading as a duration.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        Duration::new(self.secs, self.micros * 1000)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}

/// Payload sent by the latency probe.
#[must_use]
pub fn latency_payload(stamp: Stamp) -> String {
    format!("{LATENCY_GREETING}{stamp}")
}

/// Payload sent by connection A of the fan-out verifier.
#[must_use]
pub fn fan_out_payload(stamp: Stamp) -> String {
    format!("{FAN_OUT_GREETING}{stamp}")
}

/// Start and end instants of one measured exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    /// Instant recorded before the exchange began.
    pub start: Instant,
    /// Instant recorded after the exchange finished.
    pub end: Instant,
}

impl TimingSample {
    /// Close a sample started at `start` now.
    #[must_use]
    pub fn since(start: Instant) -> Self {
        Self {
            start,
            end: Instant::now(),
        }
    }

    /// Elapsed time; never negative.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}
