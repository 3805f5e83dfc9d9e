//! # wsprobe - Latency and fan-out probes for WebSocket echo endpoints
//!
//! `wsprobe` checks a WebSocket echo service from the outside:
//!
//! - **Latency probe**: one connection sends a timestamped payload and times
//!   the echo, checking both the round-trip time and that the payload came
//!   back byte-for-byte.
//! - **Fan-out verifier**: two connections are open at once, one sends, and
//!   both receives are awaited concurrently to check who the endpoint
//!   delivers to.
//!
//! The WebSocket client is injected through the [`Connector`] trait.
//! [`WsConnector`] talks to real endpoints; [`MemoryHub`] is an in-process
//! echo service for offline runs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsprobe::{Config, Suite, SystemClock, WsConnector};
//!
//! let config = Config::from_env()?;
//! let report = Suite::standard(&config, WsConnector::new(), SystemClock).run().await;
//! println!("{report}");
//! ```

pub mod config;
pub mod error;
pub mod payload;
pub mod probe;
pub mod session;
pub mod suite;
pub mod transport;

pub use config::{Config, DEFAULT_ENDPOINT, Endpoint, FanOut, Timeouts};
pub use error::{Error, Operation, Party, Result};
pub use payload::{Clock, FixedClock, Stamp, SystemClock, TimingSample};
pub use probe::{FanOutReport, FanOutVerifier, LatencyProbe, LatencyReport};
pub use session::{Delivery, Session};
pub use suite::{Outcome, Scenario, Suite, SuiteReport};
pub use transport::{
    Connection, Connector, HubOptions, HubStats, MemoryHub, TransportError, WsConnector,
};
