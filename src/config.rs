//! Client configuration.
//!
//! A `Config` is immutable for the lifetime of a client instance: address,
//! retry bound, per-operation timeouts, prefetch count, credential set, the
//! two consumer callbacks, and an optional logging sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_TIMEOUT, DEFAULT_RETRY,
    DEFAULT_WRITE_TIMEOUT,
};
use crate::logging::LogSink;
use crate::protocol::{AuthCredential, ControlRequest};

/// Callback receiving the raw text of every inbound frame.
pub type FrameHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Callback polled for outbound remote-control requests.
///
/// Returns `None` when there is nothing to send right now.
pub type ControlProducer = Arc<dyn Fn() -> Option<ControlRequest> + Send + Sync>;

/// Per-operation deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Dial and TLS handshake deadline.
    pub connect: Duration,
    /// Deadline re-armed on every read.
    pub read: Duration,
    /// Deadline re-armed on every write.
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            write: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl Timeouts {
    /// Build timeouts from whole seconds, mirroring the service's
    /// second-granularity configuration surface.
    pub fn from_secs(connect: u64, read: u64, write: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect),
            read: Duration::from_secs(read),
            write: Duration::from_secs(write),
        }
    }
}

/// Configuration of a [`SnotiClient`](crate::SnotiClient).
#[derive(Clone)]
pub struct Config {
    /// Server address, `host:port`.
    pub addr: String,
    /// Connection cycles to attempt; 0 means the default of 3.
    pub retry: u32,
    /// Per-operation deadlines.
    pub timeouts: Timeouts,
    /// Server-side hint limiting unacknowledged in-flight events.
    pub prefetch_count: u32,
    /// Credentials sent with the login request, in order.
    pub credentials: Vec<AuthCredential>,
    /// Inbound frame callback.
    pub on_frame: FrameHandler,
    /// Optional remote-control producer callback.
    pub producer: Option<ControlProducer>,
    /// Optional logging sink.
    pub sink: Option<Arc<dyn LogSink>>,
    /// Capacity of the shared outbound queue.
    pub outbound_capacity: usize,
    /// Capacity of each log-severity queue.
    pub log_capacity: usize,
}

impl Config {
    /// Create a configuration with the mandatory pieces and defaults for
    /// everything else.
    pub fn new(
        addr: impl Into<String>,
        credentials: Vec<AuthCredential>,
        on_frame: FrameHandler,
    ) -> Self {
        Self {
            addr: addr.into(),
            retry: 0,
            timeouts: Timeouts::default(),
            prefetch_count: 0,
            credentials,
            on_frame,
            producer: None,
            sink: None,
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            log_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the retry bound.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-operation timeouts.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the prefetch count sent with the login request.
    pub fn with_prefetch_count(mut self, prefetch_count: u32) -> Self {
        self.prefetch_count = prefetch_count;
        self
    }

    /// Set the remote-control producer callback.
    pub fn with_producer(mut self, producer: ControlProducer) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Set the logging sink.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the outbound queue capacity.
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Set the capacity of each log-severity queue.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Effective retry bound: configured value, or the default when unset.
    pub(crate) fn retry_bound(&self) -> u32 {
        if self.retry == 0 {
            DEFAULT_RETRY
        } else {
            self.retry
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("retry", &self.retry)
            .field("timeouts", &self.timeouts)
            .field("prefetch_count", &self.prefetch_count)
            .field("credentials", &self.credentials)
            .field("on_frame", &"[PRESENT]")
            .field("producer", &self.producer.as_ref().map(|_| "[PRESENT]"))
            .field("sink", &self.sink.as_ref().map(|_| "[PRESENT]"))
            .field("outbound_capacity", &self.outbound_capacity)
            .field("log_capacity", &self.log_capacity)
            .finish()
    }
}
