//! Stream event monitoring.
//!
//! Provides event streams for observing the lifecycle of a duplex stream:
//! end of the readable side, finish of the writable side, errors and the
//! terminal close.

use crate::error::Error;
use std::fmt;

/// Duplex stream lifecycle events.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// The consumer has read everything, no more data will follow.
    End,

    /// The writable side finished (half-close completed).
    Finish,

    /// The stream failed.
    Error(Error),

    /// Teardown completed. Always the last event, emitted once.
    Close,
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::End => write!(f, "Readable side ended"),
            Self::Finish => write!(f, "Writable side finished"),
            Self::Error(err) => write!(f, "Stream error: {err}"),
            Self::Close => write!(f, "Stream closed"),
        }
    }
}

/// Handle for receiving stream events.
///
/// A live monitor also counts as an error listener: errors emitted while at
/// least one monitor is subscribed are considered handled.
pub type StreamMonitor = flume::Receiver<StreamEvent>;

/// Internal sender for stream events.
pub type StreamEventSender = flume::Sender<StreamEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (StreamEventSender, StreamMonitor) {
    flume::unbounded()
}
