//! Configuration for probe scenarios.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Public echo service used when no endpoint is configured.
pub const DEFAULT_ENDPOINT: &str = "wss://ws.postman-echo.com/raw";

/// Connection target of a probe.
///
/// Only `ws://` and `wss://` URIs are accepted; the rest of the URI is passed
/// to the connector untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Parse an endpoint URI.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URI does not use the `ws` or `wss` scheme
    /// or has no host part.
    pub fn parse(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        let rest = uri
            .strip_prefix("ws://")
            .or_else(|| uri.strip_prefix("wss://"))
            .ok_or_else(|| Error::Config(format!("endpoint must be ws:// or wss://: {uri:?}")))?;
        if rest.is_empty() || rest.starts_with('/') {
            return Err(Error::Config(format!("endpoint has no host: {uri:?}")));
        }
        Ok(Self(uri))
    }

    /// The endpoint URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the endpoint requires TLS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.0.starts_with("wss://")
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self(DEFAULT_ENDPOINT.to_string())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-operation bounds.
///
/// Every connect, send and receive is wrapped in its own timeout; exceeding it
/// is reported as [`Error::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Opening handshake.
    ///
    /// Default: 5 seconds
    pub connect: Duration,

    /// Sending one message.
    ///
    /// Default: 5 seconds
    pub send: Duration,

    /// Waiting for one expected inbound message.
    ///
    /// Default: 5 seconds
    pub recv: Duration,

    /// How long a connection expected to receive nothing is watched before
    /// its silence counts as confirmed.
    ///
    /// Default: 1 second
    pub silence: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            send: Duration::from_secs(5),
            recv: Duration::from_secs(5),
            silence: Duration::from_secs(1),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(connect: Duration, send: Duration, recv: Duration, silence: Duration) -> Self {
        Self {
            connect,
            send,
            recv,
            silence,
        }
    }

    /// Use the same bound for every operation, silence window included.
    #[must_use]
    pub const fn uniform(bound: Duration) -> Self {
        Self {
            connect: bound,
            send: bound,
            recv: bound,
            silence: bound,
        }
    }
}

/// Which connections an endpoint delivers an inbound message to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FanOut {
    /// The message is echoed back to the connection that sent it.
    pub self_echo: bool,
    /// The message is relayed to every other connected party.
    pub relay: bool,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::broadcast()
    }
}

impl FanOut {
    /// Echo to the sender and relay to everyone else.
    #[must_use]
    pub const fn broadcast() -> Self {
        Self {
            self_echo: true,
            relay: true,
        }
    }

    /// Echo to the sender only.
    #[must_use]
    pub const fn echo_only() -> Self {
        Self {
            self_echo: true,
            relay: false,
        }
    }

    /// Relay to everyone but the sender.
    #[must_use]
    pub const fn relay_only() -> Self {
        Self {
            self_echo: false,
            relay: true,
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Endpoint every scenario connects to.
    ///
    /// Default: [`DEFAULT_ENDPOINT`]
    pub endpoint: Endpoint,

    /// Maximum allowed round-trip time of the latency probe.
    ///
    /// Default: 2000 ms
    pub latency_threshold: Duration,

    /// Network operation bounds.
    pub timeouts: Timeouts,

    /// Delivery pattern the fan-out verifier expects from the endpoint.
    ///
    /// Default: [`FanOut::broadcast`]
    pub fan_out: FanOut,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            latency_threshold: Duration::from_millis(2000),
            timeouts: Timeouts::default(),
            fan_out: FanOut::default(),
        }
    }
}

impl Config {
    /// Create a configuration for the given endpoint with default settings.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Set the latency threshold.
    #[must_use]
    pub const fn with_latency_threshold(mut self, threshold: Duration) -> Self {
        self.latency_threshold = threshold;
        self
    }

    /// Set the operation timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the expected fan-out.
    #[must_use]
    pub const fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Build a configuration from `WSPROBE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Recognised keys: `WSPROBE_ENDPOINT`, `WSPROBE_LATENCY_THRESHOLD_MS`,
    /// `WSPROBE_CONNECT_TIMEOUT_MS`, `WSPROBE_SEND_TIMEOUT_MS`,
    /// `WSPROBE_RECV_TIMEOUT_MS`, `WSPROBE_SILENCE_MS`,
    /// `WSPROBE_EXPECT_SELF_ECHO`, `WSPROBE_EXPECT_RELAY`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(uri) = lookup("WSPROBE_ENDPOINT") {
            config.endpoint = Endpoint::parse(uri)?;
        }

        let millis = |key: &str, slot: &mut Duration| -> Result<()> {
            if let Some(raw) = lookup(key) {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("{key} is not a millisecond count: {raw:?}")))?;
                *slot = Duration::from_millis(ms);
            }
            Ok(())
        };
        millis("WSPROBE_LATENCY_THRESHOLD_MS", &mut config.latency_threshold)?;
        millis("WSPROBE_CONNECT_TIMEOUT_MS", &mut config.timeouts.connect)?;
        millis("WSPROBE_SEND_TIMEOUT_MS", &mut config.timeouts.send)?;
        millis("WSPROBE_RECV_TIMEOUT_MS", &mut config.timeouts.recv)?;
        millis("WSPROBE_SILENCE_MS", &mut config.timeouts.silence)?;

        let flag = |key: &str, slot: &mut bool| -> Result<()> {
            if let Some(raw) = lookup(key) {
                *slot = match raw.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    _ => return Err(Error::Config(format!("{key} is not a boolean: {raw:?}"))),
                };
            }
            Ok(())
        };
        flag("WSPROBE_EXPECT_SELF_ECHO", &mut config.fan_out.self_echo)?;
        flag("WSPROBE_EXPECT_RELAY", &mut config.fan_out.relay)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert!(config.endpoint.is_secure());
        assert_eq!(config.latency_threshold, Duration::from_millis(2000));
        assert_eq!(config.timeouts.recv, Duration::from_millis(5000));
        assert_eq!(config.fan_out, FanOut::broadcast());
    }

    #[test]
    fn test_endpoint_parse() {
        assert!(Endpoint::parse("ws://127.0.0.1:9001").is_ok());
        assert!(Endpoint::parse("wss://echo.example/raw").is_ok());
        assert!(matches!(
            Endpoint::parse("http://echo.example"),
            Err(Error::Config(_))
        ));
        assert!(matches!(Endpoint::parse("ws://"), Err(Error::Config(_))));
        assert!(matches!(Endpoint::parse("ws:///path"), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("WSPROBE_ENDPOINT", "ws://localhost:9001"),
            ("WSPROBE_LATENCY_THRESHOLD_MS", "250"),
            ("WSPROBE_RECV_TIMEOUT_MS", " 750 "),
            ("WSPROBE_EXPECT_RELAY", "false"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint.as_str(), "ws://localhost:9001");
        assert_eq!(config.latency_threshold, Duration::from_millis(250));
        assert_eq!(config.timeouts.recv, Duration::from_millis(750));
        assert_eq!(config.timeouts.connect, Duration::from_millis(5000));
        assert_eq!(config.fan_out, FanOut::echo_only());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = Config::from_lookup(lookup(&[("WSPROBE_SEND_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("WSPROBE_SEND_TIMEOUT_MS"));

        let err = Config::from_lookup(lookup(&[("WSPROBE_EXPECT_SELF_ECHO", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builders() {
        let config = Config::new(Endpoint::parse("ws://127.0.0.1:1").unwrap())
            .with_latency_threshold(Duration::from_millis(10))
            .with_timeouts(Timeouts::uniform(Duration::from_millis(100)))
            .with_fan_out(FanOut::relay_only());
        assert_eq!(config.latency_threshold, Duration::from_millis(10));
        assert_eq!(config.timeouts.silence, Duration::from_millis(100));
        assert!(!config.fan_out.self_echo);
    }
}
