//! Log routing to an optional consumer-supplied sink.
//!
//! Lifecycle events are pushed onto three bounded severity queues and fanned
//! in to the sink by a router loop running for the duration of a client run.
//! Absence of a sink discards all entries. Producers block when a queue is
//! full; supervisor teardown uses the non-blocking variants so it never
//! stalls on log delivery.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Consumer-supplied logging sink with one entry point per severity.
pub trait LogSink: Send + Sync {
    /// Record an error entry.
    fn error(&self, message: &str);
    /// Record a warning entry.
    fn warn(&self, message: &str);
    /// Record an informational entry.
    fn info(&self, message: &str);
}

/// Sending side of the three severity queues. Cheap to clone into loops.
#[derive(Clone)]
pub(crate) struct LogChannels {
    error: mpsc::Sender<String>,
    warn: mpsc::Sender<String>,
    info: mpsc::Sender<String>,
}

/// Receiving side of the three severity queues, owned by the client and
/// lent to the router loop for the duration of a cycle.
pub(crate) struct LogReceivers {
    error: mpsc::Receiver<String>,
    warn: mpsc::Receiver<String>,
    info: mpsc::Receiver<String>,
}

impl LogChannels {
    /// Create the three bounded severity queues.
    pub(crate) fn bounded(capacity: usize) -> (LogChannels, LogReceivers) {
        let (error_tx, error_rx) = mpsc::channel(capacity);
        let (warn_tx, warn_rx) = mpsc::channel(capacity);
        let (info_tx, info_rx) = mpsc::channel(capacity);
        (
            LogChannels {
                error: error_tx,
                warn: warn_tx,
                info: info_tx,
            },
            LogReceivers {
                error: error_rx,
                warn: warn_rx,
                info: info_rx,
            },
        )
    }

    pub(crate) async fn error(&self, message: impl Into<String>) {
        let _ = self.error.send(message.into()).await;
    }

    pub(crate) async fn warn(&self, message: impl Into<String>) {
        let _ = self.warn.send(message.into()).await;
    }

    pub(crate) async fn info(&self, message: impl Into<String>) {
        let _ = self.info.send(message.into()).await;
    }

    /// Non-blocking error entry; dropped if the queue is full.
    pub(crate) fn try_error(&self, message: impl Into<String>) {
        let _ = self.error.try_send(message.into());
    }

    /// Non-blocking informational entry; dropped if the queue is full.
    pub(crate) fn try_info(&self, message: impl Into<String>) {
        let _ = self.info.try_send(message.into());
    }
}

/// Fan the severity queues in to the sink until `stop` is cancelled.
///
/// Entries are drained even without a sink so the queues cannot fill up
/// and stall producers forever. The receivers are owned by the client and
/// locked here for the duration of the run; after cancellation anything
/// still queued is delivered before the router returns.
pub(crate) async fn route(
    receivers: Arc<tokio::sync::Mutex<LogReceivers>>,
    sink: Option<Arc<dyn LogSink>>,
    stop: CancellationToken,
) {
    let mut guard = receivers.lock().await;
    let LogReceivers { error, warn, info } = &mut *guard;
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            Some(message) = error.recv() => {
                if let Some(sink) = &sink {
                    sink.error(&message);
                }
            }
            Some(message) = warn.recv() => {
                if let Some(sink) = &sink {
                    sink.warn(&message);
                }
            }
            Some(message) = info.recv() => {
                if let Some(sink) = &sink {
                    sink.info(&message);
                }
            }
        }
    }

    // Final entries, queued after the last select round, still get out.
    while let Ok(message) = error.try_recv() {
        if let Some(sink) = &sink {
            sink.error(&message);
        }
    }
    while let Ok(message) = warn.try_recv() {
        if let Some(sink) = &sink {
            sink.warn(&message);
        }
    }
    while let Ok(message) = info.try_recv() {
        if let Some(sink) = &sink {
            sink.info(&message);
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::test_sink::RecordingSink;
    use super::*;

    #[tokio::test]
    async fn router_forwards_each_severity() {
        let (tx, rx) = LogChannels::bounded(8);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let sink = Arc::new(RecordingSink::default());
        let stop = CancellationToken::new();

        let router = tokio::spawn(route(
            rx,
            Some(sink.clone() as Arc<dyn LogSink>),
            stop.clone(),
        ));

        tx.error("boom").await;
        tx.warn("careful").await;
        tx.info("hello").await;

        // Give the router a chance to drain before stopping it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();
        router.await.unwrap();

        let entries = sink.entries();
        assert!(entries.contains(&("error", "boom".to_string())));
        assert!(entries.contains(&("warn", "careful".to_string())));
        assert!(entries.contains(&("info", "hello".to_string())));
    }

    #[tokio::test]
    async fn router_drains_without_a_sink() {
        let (tx, rx) = LogChannels::bounded(8);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let stop = CancellationToken::new();
        let router = tokio::spawn(route(Arc::clone(&rx), None, stop.clone()));

        tx.info("discarded").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();
        router.await.unwrap();

        assert!(rx.lock().await.info.try_recv().is_err());
    }

    #[tokio::test]
    async fn router_delivers_entries_queued_before_it_stops() {
        let (tx, rx) = LogChannels::bounded(8);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let sink = Arc::new(RecordingSink::default());
        let stop = CancellationToken::new();

        // Entries enqueued with the router already told to stop must
        // still reach the sink.
        tx.error("late failure").await;
        tx.info("late farewell").await;
        stop.cancel();
        route(rx, Some(sink.clone() as Arc<dyn LogSink>), stop).await;

        let entries = sink.entries();
        assert!(entries.contains(&("error", "late failure".to_string())));
        assert!(entries.contains(&("info", "late farewell".to_string())));
    }

    #[tokio::test]
    async fn try_variants_drop_when_full() {
        let (tx, _rx) = LogChannels::bounded(1);
        tx.try_info("first");
        tx.try_info("dropped"); // queue full, must not block or panic
        tx.try_error("first");
        tx.try_error("dropped");
    }
}
