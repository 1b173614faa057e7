//! Error types for the SNoti client.

use thiserror::Error;

/// Main error type for client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read or write deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// The server closed the connection (end of stream).
    #[error("connection closed")]
    ConnectionClosed,

    /// Transport-level failure (dial, TLS handshake).
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Protocol violation or malformed inbound frame.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Serialization failure for an outbound frame.
    #[error("codec error: {message}")]
    Codec { message: String },
}

impl Error {
    /// Returns true if this error is fatal for the current connection cycle.
    ///
    /// Fatal errors latch the session's closed flag: end of stream, TLS or
    /// dial failures, and I/O errors that are neither a timeout nor an
    /// interrupted call.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::ConnectionClosed | Error::Transport { .. } => true,
            Error::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Returns true if the operation may simply be retried on the next
    /// loop iteration over the same connection.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Convenience result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
