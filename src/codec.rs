//! Newline-delimited frame codec with per-operation deadlines.
//!
//! Each frame is one line of text (a JSON object on this protocol). The
//! reader and writer re-arm their deadline on every call; an elapsed
//! deadline is a transient [`Error::Timeout`]. Fatal transport errors latch
//! the session's closed token before being returned.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Error, Result};

/// Reading half of the frame codec.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    timeout: Duration,
    closed: CancellationToken,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a transport read half with a per-read deadline.
    pub fn new(inner: R, timeout: Duration, closed: CancellationToken) -> Self {
        Self {
            inner: BufReader::new(inner),
            timeout,
            closed,
        }
    }

    /// Read one frame, without its trailing delimiter.
    ///
    /// End of stream returns [`Error::ConnectionClosed`] and latches the
    /// closed token, as does any other fatal I/O error.
    pub async fn read_frame(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(self.timeout, self.inner.read_line(&mut line)).await;
        let n = match read {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(self.latch(Error::Io(e))),
            Err(_) => return Err(Error::Timeout),
        };

        if n == 0 {
            return Err(self.latch(Error::ConnectionClosed));
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        trace!(len = line.len(), "read frame");
        Ok(line)
    }

    fn latch(&self, error: Error) -> Error {
        if error.is_fatal() {
            self.closed.cancel();
        }
        error
    }
}

/// Writing half of the frame codec.
pub struct FrameWriter<W> {
    inner: W,
    timeout: Duration,
    closed: CancellationToken,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a transport write half with a per-write deadline.
    pub fn new(inner: W, timeout: Duration, closed: CancellationToken) -> Self {
        Self {
            inner,
            timeout,
            closed,
        }
    }

    /// Write one frame, appending the delimiter.
    pub async fn write_frame(&mut self, frame: &str) -> Result<()> {
        let write = tokio::time::timeout(self.timeout, async {
            self.inner.write_all(frame.as_bytes()).await?;
            self.inner.write_all(b"\n").await?;
            self.inner.flush().await
        })
        .await;

        match write {
            Ok(Ok(())) => {
                trace!(len = frame.len(), "wrote frame");
                Ok(())
            }
            Ok(Err(e)) => Err(self.latch(Error::Io(e))),
            Err(_) => Err(Error::Timeout),
        }
    }

    fn latch(&self, error: Error) -> Error {
        if error.is_fatal() {
            self.closed.cancel();
        }
        error
    }
}
