//! wsbridge Error Types
//!
//! Errors raised by message sockets and surfaced through the duplex stream.

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Main error type for wsbridge operations.
///
/// Errors travel to several places at once (the destroy completion, the
/// stream's error event, every monitor), so the type is cheap to clone.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// IO error on the socket transport
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),

    /// Opening handshake failed before the socket reached OPEN
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Transport failure after the socket was open
    #[error("Transport error: {0}")]
    Transport(String),

    /// Peer violated the message protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Socket is already closed
    #[error("Socket closed")]
    SocketClosed,

    /// Stream was destroyed before the operation could complete
    #[error("Stream destroyed")]
    Destroyed,

    /// Write issued after the write side was ended
    #[error("Write after end")]
    WriteAfterEnd,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result type alias for wsbridge operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a handshake error with a message
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Create a transport error with a message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Check if this is a connection error
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::SocketClosed | Self::Handshake(_) | Self::Transport(_)
        )
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            Error::Io(e) => e.kind(),
            Error::SocketClosed | Error::Destroyed => io::ErrorKind::BrokenPipe,
            Error::Handshake(_) => io::ErrorKind::ConnectionRefused,
            Error::Transport(_) => io::ErrorKind::ConnectionReset,
            Error::Protocol(_) => io::ErrorKind::InvalidData,
            Error::WriteAfterEnd => io::ErrorKind::InvalidInput,
        };
        Self::new(kind, err)
    }
}
