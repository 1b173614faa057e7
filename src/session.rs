//! Shared cancellation state of one connection cycle.
//!
//! Two monotonic conditions end a cycle: *closed* (unrecoverable transport
//! failure, latched by the codec) and *exiting* (process-level shutdown,
//! latched by the signal watcher). Each is a `CancellationToken` so every
//! blocking point can race against it instead of polling a flag.

use tokio_util::sync::CancellationToken;

/// Cancellation tokens shared by all loops of one connection cycle.
///
/// `exiting` outlives the cycle (it belongs to the client); `closed` is
/// fresh per cycle and never resets once cancelled.
#[derive(Debug, Clone)]
pub(crate) struct SessionFlags {
    closed: CancellationToken,
    exiting: CancellationToken,
}

impl SessionFlags {
    pub(crate) fn new(exiting: CancellationToken) -> Self {
        Self {
            closed: CancellationToken::new(),
            exiting,
        }
    }

    /// Token latched on fatal transport errors. Cloned into the codec.
    pub(crate) fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Latch the closed condition.
    pub(crate) fn close(&self) {
        self.closed.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.closed.is_cancelled() || self.exiting.is_cancelled()
    }

    /// Resolves once the cycle should stop, for either reason.
    pub(crate) async fn stopped(&self) {
        tokio::select! {
            _ = self.closed.cancelled() => {}
            _ = self.exiting.cancelled() => {}
        }
    }
}
