//! Process shutdown signal watcher.
//!
//! One task per client lifetime waits for an interrupt or termination
//! signal, logs it, and cancels the exiting token. Loops are never
//! interrupted preemptively; they observe the token at their next
//! suspension point.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::logging::LogChannels;

/// Spawn the watcher. The first signal received requests shutdown.
pub(crate) fn watch_signals(exiting: CancellationToken, log: LogChannels) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        deliver(&exiting, &log, signal);
    })
}

/// Cancel first, then log. Cancellation must never wait on log delivery.
fn deliver(exiting: &CancellationToken, log: &LogChannels, signal: &'static str) {
    exiting.cancel();
    log.try_info(format!("caught {signal}, shutting down"));
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(_) => {
            // No SIGTERM stream available; interrupt still works.
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
