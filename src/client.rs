//! Connection-lifecycle engine.
//!
//! [`SnotiClient::run`] drives everything: it attempts up to the configured
//! number of connection cycles, and each successful dial runs the login
//! handshake followed by three background loops (heartbeat, outbound
//! dispatch, remote-control production) plus the inbound loop, which the
//! supervisor awaits inline. The log router spans the whole run, so entries
//! logged between cycles still reach the sink. The outbound queue is one
//! FIFO channel shared by every producer, so global enqueue order is the
//! observable write order. Cancellation is cooperative: loops race their
//! blocking points against the session's closed/exiting tokens, and the
//! supervisor joins every loop before a retry reuses the shared queues.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::{FrameReader, FrameWriter};
use crate::config::{Config, ControlProducer};
use crate::constants::{CONTROL_POLL_INTERVAL, HEARTBEAT_INTERVAL, PING_FRAME, RETRY_COOLDOWN};
use crate::error::Result;
use crate::logging::{self, LogChannels, LogReceivers};
use crate::protocol::{EventAck, InboundEvent, LoginRequest};
use crate::session::SessionFlags;
use crate::{shutdown, transport};

/// Persistent client for the push-notification service.
///
/// Construct with [`SnotiClient::new`], then call [`SnotiClient::run`],
/// which returns once the retry bound is exhausted or shutdown was
/// requested. All queues are owned by the instance; two clients never
/// share state.
pub struct SnotiClient {
    config: Config,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    log: LogChannels,
    log_rx: Arc<Mutex<LogReceivers>>,
    exiting: CancellationToken,
    signals_watched: bool,
}

/// Cloneable handle requesting cooperative shutdown of a running client.
///
/// Complements the signal watcher for embedders that manage their own
/// lifecycle.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    exiting: CancellationToken,
}

impl ShutdownHandle {
    /// Request shutdown. Loops stop at their next suspension point.
    pub fn shutdown(&self) {
        self.exiting.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.exiting.is_cancelled()
    }
}

impl SnotiClient {
    /// Create a client from its configuration.
    pub fn new(config: Config) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (log, log_rx) = LogChannels::bounded(config.log_capacity.max(1));
        Self {
            config,
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(outbound_rx)),
            log,
            log_rx: Arc::new(Mutex::new(log_rx)),
            exiting: CancellationToken::new(),
            signals_watched: false,
        }
    }

    /// Handle for requesting shutdown from outside the run loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            exiting: self.exiting.clone(),
        }
    }

    /// Run the client until the retry bound is exhausted or shutdown is
    /// requested. The caller decides what to do after it returns.
    pub async fn run(&mut self) {
        if !self.signals_watched {
            shutdown::watch_signals(self.exiting.clone(), self.log.clone());
            self.signals_watched = true;
        }

        // The router spans every cycle, so failures logged between cycles
        // (a refused dial, the final farewell) still reach the sink.
        let router_stop = CancellationToken::new();
        let router = tokio::spawn(logging::route(
            Arc::clone(&self.log_rx),
            self.config.sink.clone(),
            router_stop.clone(),
        ));

        let retry = self.config.retry_bound();
        for attempt in 1..=retry {
            if self.exiting.is_cancelled() {
                break;
            }
            self.log.try_info(format!(
                "connecting to {} (cycle {attempt}/{retry})",
                self.config.addr
            ));
            if let Err(e) = self.cycle().await {
                self.log.try_error(format!("connection cycle failed: {e}"));
            }
            if attempt < retry && !self.exiting.is_cancelled() {
                tokio::select! {
                    _ = self.exiting.cancelled() => {}
                    _ = tokio::time::sleep(RETRY_COOLDOWN) => {}
                }
            }
        }
        self.log.try_info("client run loop finished");

        router_stop.cancel();
        let _ = router.await;
    }

    /// One connection cycle: dial, login, run the loops, tear down.
    async fn cycle(&self) -> Result<()> {
        let flags = SessionFlags::new(self.exiting.clone());

        let tls = transport::connect(&self.config.addr, self.config.timeouts.connect).await?;
        let (read_half, write_half) = tokio::io::split(tls);
        let mut reader =
            FrameReader::new(read_half, self.config.timeouts.read, flags.closed_token());
        let mut writer =
            FrameWriter::new(write_half, self.config.timeouts.write, flags.closed_token());

        // Login must be the first frame on the wire; failure aborts the
        // cycle before any loop starts.
        let login =
            LoginRequest::new(self.config.prefetch_count, &self.config.credentials).to_frame()?;
        writer.write_frame(&login).await?;
        self.log.try_info("login request sent");

        let mut tasks = JoinSet::new();
        tasks.spawn(heartbeat_loop(
            flags.clone(),
            self.outbound_tx.clone(),
            self.log.clone(),
        ));
        tasks.spawn(write_loop(
            writer,
            Arc::clone(&self.outbound_rx),
            flags.clone(),
            self.log.clone(),
        ));
        tasks.spawn(control_loop(
            flags.clone(),
            self.config.producer.clone(),
            self.outbound_tx.clone(),
            self.log.clone(),
        ));

        let result = self.read_loop(&mut reader, &flags).await;

        // Every loop must have fully stopped before the next cycle reuses
        // the shared queues.
        flags.close();
        while tasks.join_next().await.is_some() {}
        debug!("connection cycle torn down");

        result
    }

    /// Inbound loop, awaited inline by the supervisor.
    async fn read_loop<R: AsyncRead + Unpin>(
        &self,
        reader: &mut FrameReader<R>,
        flags: &SessionFlags,
    ) -> Result<()> {
        loop {
            let frame = tokio::select! {
                _ = flags.stopped() => return Ok(()),
                read = reader.read_frame() => match read {
                    Ok(frame) => frame,
                    Err(e) if e.is_fatal() => {
                        self.log.try_error(format!("inbound read failed: {e}"));
                        return Err(e);
                    }
                    Err(e) => {
                        self.log.warn(format!("transient inbound read error: {e}")).await;
                        continue;
                    }
                },
            };

            if frame.is_empty() {
                continue;
            }

            let ack_id = match InboundEvent::parse(&frame) {
                Ok(event) => event.ack_id(),
                Err(e) => {
                    self.log.warn(e.to_string()).await;
                    None
                }
            };

            // The consumer sees every frame before any acknowledgment is
            // queued for it.
            (self.config.on_frame)(frame);

            if let Some(delivery_id) = ack_id {
                match EventAck::new(delivery_id).to_frame() {
                    Ok(ack) => {
                        tokio::select! {
                            _ = flags.stopped() => return Ok(()),
                            _ = self.outbound_tx.send(ack) => {}
                        }
                    }
                    Err(e) => self.log.error(e.to_string()).await,
                }
            }
        }
    }
}

/// Enqueue a keep-alive ping once per interval while the session is alive.
async fn heartbeat_loop(flags: SessionFlags, outbound: mpsc::Sender<String>, log: LogChannels) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await; // the first tick completes immediately
    loop {
        tokio::select! {
            _ = flags.stopped() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    _ = flags.stopped() => break,
                    _ = outbound.send(PING_FRAME.to_owned()) => {}
                }
            }
        }
    }
    log.info("heartbeat loop stopped").await;
}

/// Drain the shared outbound queue to the transport, in enqueue order.
async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    outbound: Arc<Mutex<mpsc::Receiver<String>>>,
    flags: SessionFlags,
    log: LogChannels,
) where
    W: AsyncWrite + Unpin,
{
    let mut outbound = outbound.lock().await;
    loop {
        let message = tokio::select! {
            _ = flags.stopped() => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        if let Err(e) = writer.write_frame(&message).await {
            if e.is_fatal() {
                log.error(format!("outbound write failed: {e}")).await;
                break;
            }
            log.warn(format!("dropped outbound frame after transient write error: {e}"))
                .await;
        }
    }
    log.info("outbound loop stopped").await;
}

/// Poll the consumer's producer callback for remote-control requests.
async fn control_loop(
    flags: SessionFlags,
    producer: Option<ControlProducer>,
    outbound: mpsc::Sender<String>,
    log: LogChannels,
) {
    let Some(producer) = producer else {
        log.info("no producer callback configured, remote-control loop not started")
            .await;
        return;
    };

    while !flags.is_stopped() {
        match producer() {
            None => {
                tokio::select! {
                    _ = flags.stopped() => break,
                    _ = tokio::time::sleep(CONTROL_POLL_INTERVAL) => {}
                }
            }
            Some(request) => match request.to_frame() {
                Ok(frame) => {
                    tokio::select! {
                        _ = flags.stopped() => break,
                        _ = outbound.send(frame) => {}
                    }
                }
                Err(e) => log.error(format!("dropped control request: {e}")).await,
            },
        }
    }
    log.info("remote-control loop stopped").await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use crate::error::Error;
    use crate::logging::test_sink::RecordingSink;
    use crate::protocol::{ControlRequest, RawControl, RawControlItem, RawTarget};

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn raw_request(msg_id: &str) -> ControlRequest {
        ControlRequest::Raw(RawControl {
            cmd: "remote_control_v2_req".into(),
            msg_id: msg_id.into(),
            items: vec![RawControlItem {
                cmd: "write".into(),
                data: RawTarget {
                    did: "d1".into(),
                    mac: "aa:bb".into(),
                    product_key: "pk".into(),
                    raw: vec![1, 2, 3],
                },
            }],
        })
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_enqueues_one_ping_per_interval() {
        let (tx, mut rx) = mpsc::channel(8);
        let flags = SessionFlags::new(CancellationToken::new());
        let (log, _log_rx) = LogChannels::bounded(8);
        let task = tokio::spawn(heartbeat_loop(flags.clone(), tx, log));

        tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        assert_eq!(rx.recv().await.unwrap(), PING_FRAME);
        tokio::time::sleep(HEARTBEAT_INTERVAL).await;
        assert_eq!(rx.recv().await.unwrap(), PING_FRAME);
        assert!(rx.try_recv().is_err());

        flags.close();
        task.await.unwrap();

        tokio::time::sleep(HEARTBEAT_INTERVAL * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn outbound_writes_preserve_enqueue_order() {
        let (local, remote) = tokio::io::duplex(4096);
        let (_read_half, write_half) = tokio::io::split(local);
        let flags = SessionFlags::new(CancellationToken::new());
        let writer = FrameWriter::new(write_half, TIMEOUT, flags.closed_token());
        let (tx, rx) = mpsc::channel(16);
        let (log, _log_rx) = LogChannels::bounded(8);

        // Interleaved producers all share the one queue.
        tx.send(PING_FRAME.to_owned()).await.unwrap();
        tx.send(EventAck::new(1).to_frame().unwrap()).await.unwrap();
        tx.send(raw_request("m-1").to_frame().unwrap()).await.unwrap();
        tx.send(EventAck::new(2).to_frame().unwrap()).await.unwrap();

        let task = tokio::spawn(write_loop(
            writer,
            Arc::new(Mutex::new(rx)),
            flags.clone(),
            log,
        ));

        let (remote_read, _remote_write) = tokio::io::split(remote);
        let mut lines = BufReader::new(remote_read).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), PING_FRAME);
        assert!(lines.next_line().await.unwrap().unwrap().contains("\"delivery_id\":1"));
        assert!(lines.next_line().await.unwrap().unwrap().contains("\"msg_id\":\"m-1\""));
        assert!(lines.next_line().await.unwrap().unwrap().contains("\"delivery_id\":2"));

        flags.close();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn read_loop_forwards_every_frame_and_acks_event_push() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink_seen = Arc::clone(&seen);
        let config = Config::new(
            "127.0.0.1:0",
            vec![],
            Arc::new(move |frame| sink_seen.lock().unwrap().push(frame)),
        );
        let client = SnotiClient::new(config);
        let flags = SessionFlags::new(CancellationToken::new());

        let (local, mut remote) = tokio::io::duplex(4096);
        let (read_half, _write_half) = tokio::io::split(local);
        let mut reader = FrameReader::new(read_half, TIMEOUT, flags.closed_token());

        remote
            .write_all(
                b"\n{\"cmd\":\"event_push\",\"delivery_id\":7}\n{\"cmd\":\"login_res\"}\nnot json\n",
            )
            .await
            .unwrap();
        drop(remote); // end of stream terminates the loop

        let err = client.read_loop(&mut reader, &flags).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(flags.is_closed());

        // Empty frame skipped; all others forwarded verbatim, in order.
        let frames = seen.lock().unwrap().clone();
        assert_eq!(
            frames,
            vec![
                "{\"cmd\":\"event_push\",\"delivery_id\":7}".to_string(),
                "{\"cmd\":\"login_res\"}".to_string(),
                "not json".to_string(),
            ]
        );

        // Exactly one acknowledgment, for the pushed event only.
        let mut outbound = client.outbound_rx.lock().await;
        let ack: serde_json::Value =
            serde_json::from_str(&outbound.try_recv().unwrap()).unwrap();
        assert_eq!(ack["cmd"], "event_ack");
        assert_eq!(ack["delivery_id"], 7);
        assert!(outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn read_loop_returns_cleanly_once_stopped() {
        let config = Config::new("127.0.0.1:0", vec![], Arc::new(|_frame| {}));
        let client = SnotiClient::new(config);
        let flags = SessionFlags::new(CancellationToken::new());

        let (local, _remote) = tokio::io::duplex(64);
        let (read_half, _write_half) = tokio::io::split(local);
        let mut reader = FrameReader::new(read_half, TIMEOUT, flags.closed_token());

        flags.close();
        assert!(client.read_loop(&mut reader, &flags).await.is_ok());
    }

    #[tokio::test]
    async fn control_loop_enqueues_produced_requests() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let producer: ControlProducer = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Some(raw_request("m-9"))
            } else {
                None
            }
        });

        let (tx, mut rx) = mpsc::channel(8);
        let flags = SessionFlags::new(CancellationToken::new());
        let (log, _log_rx) = LogChannels::bounded(8);
        let task = tokio::spawn(control_loop(flags.clone(), Some(producer), tx, log));

        let frame: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["msg_id"], "m-9");

        flags.close();
        task.await.unwrap();
        assert!(rx.try_recv().is_err());
        assert!(polls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn control_loop_without_producer_exits_immediately() {
        let (tx, mut rx) = mpsc::channel(8);
        let flags = SessionFlags::new(CancellationToken::new());
        let (log, _log_rx) = LogChannels::bounded(8);

        control_loop(flags, None, tx, log).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cycle_failures_reach_the_sink_between_cycles() {
        let sink = Arc::new(RecordingSink::default());
        // Port 1 is essentially never listening on loopback.
        let config = Config::new("127.0.0.1:1", vec![], Arc::new(|_frame| {}))
            .with_retry(1)
            .with_sink(sink.clone());

        let mut client = SnotiClient::new(config);
        client.run().await;

        let entries = sink.entries();
        assert!(entries
            .iter()
            .any(|(severity, message)| *severity == "error"
                && message.contains("connection cycle failed")));
        assert!(entries
            .iter()
            .any(|(_, message)| message.contains("run loop finished")));
    }

    #[tokio::test]
    async fn shutdown_handle_reports_state() {
        let config = Config::new("127.0.0.1:0", vec![], Arc::new(|_frame| {}));
        let client = SnotiClient::new(config);
        let handle = client.shutdown_handle();

        assert!(!handle.is_shutdown());
        handle.shutdown();
        assert!(handle.is_shutdown());
        assert!(client.exiting.is_cancelled());
    }
}
