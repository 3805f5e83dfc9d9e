//! The two probe scenarios.

mod fanout;
mod latency;

pub use fanout::{FanOutReport, FanOutVerifier};
pub use latency::{LatencyProbe, LatencyReport};
