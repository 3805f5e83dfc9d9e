//! In-process echo hub.
//!
//! Stands in for a remote echo service so probes can run offline and
//! deterministically. Delivery follows a configurable [`FanOut`], and the hub
//! can delay, corrupt or refuse traffic, fail sends, or drop a connection.
//! Connects and closes are counted.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use super::{Connection, Connector, TransportError};
use crate::config::{Endpoint, FanOut};

/// Behaviour of a [`MemoryHub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubOptions {
    /// Who receives each inbound message.
    ///
    /// Default: [`FanOut::broadcast`]
    pub fan_out: FanOut,

    /// Delay applied to every send before the message is delivered.
    ///
    /// Default: zero
    pub reply_delay: Duration,

    /// Append a replacement character to every delivered message.
    ///
    /// Default: false
    pub corrupt: bool,

    /// Fail every connect attempt.
    ///
    /// Default: false
    pub refuse_connections: bool,

    /// Fail only the connect attempt with this zero-based index.
    ///
    /// Default: None
    pub refused_attempt: Option<usize>,

    /// Fail every send with a transport error.
    ///
    /// Default: false
    pub fail_sends: bool,

    /// Drop the sending connection instead of delivering its message, so its
    /// next receive fails.
    ///
    /// Default: false
    pub disconnect_on_send: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            fan_out: FanOut::broadcast(),
            reply_delay: Duration::ZERO,
            corrupt: false,
            refuse_connections: false,
            refused_attempt: None,
            fail_sends: false,
            disconnect_on_send: false,
        }
    }
}

impl HubOptions {
    /// Set the delivery pattern.
    #[must_use]
    pub const fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Set the per-send delay.
    #[must_use]
    pub const fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Corrupt every delivered message.
    #[must_use]
    pub const fn corrupting(mut self) -> Self {
        self.corrupt = true;
        self
    }

    /// Refuse every connection.
    #[must_use]
    pub const fn refusing(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Refuse the `attempt`-th connection (zero-based) and accept the rest.
    #[must_use]
    pub const fn refusing_attempt(mut self, attempt: usize) -> Self {
        self.refused_attempt = Some(attempt);
        self
    }

    /// Fail every send.
    #[must_use]
    pub const fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Drop each connection as soon as it sends.
    #[must_use]
    pub const fn disconnecting(mut self) -> Self {
        self.disconnect_on_send = true;
        self
    }
}

/// Counters observed by a [`MemoryHub`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Successful connects.
    pub connects: usize,
    /// Explicit closes; repeated closes of one connection count once.
    pub closes: usize,
    /// Connections currently registered.
    pub open: usize,
    /// Messages delivered to any connection.
    pub delivered: usize,
}

struct Peer {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

struct Inner {
    options: HubOptions,
    peers: Mutex<Vec<Peer>>,
    next_id: AtomicU64,
    attempts: AtomicUsize,
    connects: AtomicUsize,
    closes: AtomicUsize,
    delivered: AtomicUsize,
}

impl Inner {
    fn peers(&self) -> MutexGuard<'_, Vec<Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, from: u64, text: &str) {
        let fan_out = self.options.fan_out;
        let text = if self.options.corrupt {
            format!("{text}\u{fffd}")
        } else {
            text.to_owned()
        };
        for peer in self.peers().iter() {
            let wanted = if peer.id == from {
                fan_out.self_echo
            } else {
                fan_out.relay
            };
            if wanted && peer.tx.send(text.clone()).is_ok() {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn unregister(&self, id: u64) {
        self.peers().retain(|peer| peer.id != id);
    }
}

/// An in-process echo service.
///
/// Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new(HubOptions::default())
    }
}

impl MemoryHub {
    /// Create a hub with the given behaviour.
    #[must_use]
    pub fn new(options: HubOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                peers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                attempts: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                delivered: AtomicUsize::new(0),
            }),
        }
    }

    /// The hub's behaviour.
    #[must_use]
    pub fn options(&self) -> HubOptions {
        self.inner.options
    }

    /// Snapshot of the hub's counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            connects: self.inner.connects.load(Ordering::Relaxed),
            closes: self.inner.closes.load(Ordering::Relaxed),
            open: self.inner.peers().len(),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
        }
    }
}

impl Connector for MemoryHub {
    type Connection = MemoryConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<MemoryConnection, TransportError> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::Relaxed);
        let options = &self.inner.options;
        if options.refuse_connections || options.refused_attempt == Some(attempt) {
            return Err(TransportError::new(format!("connection to {endpoint} refused")));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.peers().push(Peer { id, tx });
        self.inner.connects.fetch_add(1, Ordering::Relaxed);

        Ok(MemoryConnection {
            id,
            hub: Arc::clone(&self.inner),
            rx,
            closed: false,
        })
    }
}

/// A connection to a [`MemoryHub`].
pub struct MemoryConnection {
    id: u64,
    hub: Arc<Inner>,
    rx: mpsc::UnboundedReceiver<String>,
    closed: bool,
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Connection for MemoryConnection {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::new("connection already closed"));
        }
        let options = self.hub.options;
        if options.fail_sends {
            return Err(TransportError::new("send rejected by hub"));
        }
        if !options.reply_delay.is_zero() {
            tokio::time::sleep(options.reply_delay).await;
        }
        if options.disconnect_on_send {
            // Dropping the registered sender ends this connection's stream.
            self.hub.unregister(self.id);
            return Ok(());
        }
        self.hub.deliver(self.id, text);
        Ok(())
    }

    async fn recv(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::new("connection already closed"));
        }
        self.rx
            .recv()
            .await
            .ok_or_else(|| TransportError::new("hub dropped the connection"))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.hub.unregister(self.id);
        self.hub.closes.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.hub.unregister(self.id);
        }
    }
}
