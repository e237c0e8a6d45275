//! # wsbridge
//!
//! Duplex byte streams over event-driven message sockets.
//!
//! ## Architecture
//!
//! wsbridge is structured as a **sans-IO adapter** with clean layering:
//!
//! - **`wsbridge-core`**: Message socket contract, socket events, options,
//!   completions, errors
//! - **`wsbridge-stream`**: Adapter state machine, async duplex handle, driver
//! - **`wsbridge`**: Public API surface (this crate)
//!
//! The message socket itself (handshake, framing, network I/O) is supplied by
//! the caller through the [`MessageSocket`] trait, and reports what happens
//! to it as [`SocketEvent`]s on a `flume` channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "stream")]
//! # async fn example() -> wsbridge::Result<()> {
//! use futures::{SinkExt, StreamExt};
//! use wsbridge::prelude::*;
//! use wsbridge::recording::RecordingSocket;
//!
//! // Any MessageSocket implementation; events arrive on `socket_events`.
//! let (_peer, socket_events) = socket_event_channel();
//! let socket = RecordingSocket::new(ReadyState::Connecting);
//!
//! let (mut stream, driver) = wsbridge::create_stream(socket, StreamOptions::default(), socket_events);
//!
//! let client = async move {
//!     // Queued until the socket opens
//!     stream.send(Bytes::from_static(b"hello")).await?;
//!     if let Some(reply) = stream.next().await {
//!         println!("Received: {:?}", reply?);
//!     }
//!     // Half-close: runs the close handshake
//!     stream.close().await
//! };
//!
//! let (driven, done) = futures::join!(driver.run(), client);
//! driven?;
//! done
//! # }
//! ```
//!
//! ## Behavior
//!
//! - **Backpressure**: a full read buffer pauses the socket transport until
//!   the consumer reads and the socket's receive buffer has drained
//! - **Connecting**: writes and half-close wait for the socket to open and
//!   run in submission order
//! - **Destroy**: idempotent, always followed by exactly one
//!   [`StreamEvent::Close`]
//!
//! ## Debugging
//!
//! Call [`dev_tracing::init_tracing`] and set `RUST_LOG` (for example
//! `RUST_LOG=wsbridge_stream=trace`) to see `[STREAM]` and `[DRIVER]` logs.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core types
pub use bytes::Bytes;
pub use wsbridge_core::completion::Completion;
pub use wsbridge_core::error::{Error, Result};
pub use wsbridge_core::monitor::{StreamEvent, StreamMonitor};
pub use wsbridge_core::options::StreamOptions;
pub use wsbridge_core::ready_state::ReadyState;
pub use wsbridge_core::recording;
pub use wsbridge_core::socket::{
    socket_event_channel, MessageSocket, SocketEvent, SocketEventReceiver, SocketEventSender,
    Transport,
};

#[cfg(feature = "stream")]
pub use wsbridge_stream::{adapter, Driver, DuplexStream, Phase, StreamAdapter};

pub mod dev_tracing;

/// Wrap `socket` in a duplex byte stream.
///
/// `socket_events` is the feed on which the socket reports its events. The
/// returned [`Driver`] pumps that feed into the stream and must be polled
/// on the same thread as the stream, typically with `futures::join!`.
#[cfg(feature = "stream")]
pub fn create_stream<S: MessageSocket>(
    socket: S,
    options: StreamOptions,
    socket_events: SocketEventReceiver,
) -> (DuplexStream<S>, Driver<S>) {
    tracing::trace!(
        "[STREAM] create_stream: {} socket, {} pending events",
        socket.ready_state(),
        socket_events.len()
    );
    DuplexStream::new(socket, options, socket_events)
}

/// Convenient imports for stream users.
pub mod prelude {
    pub use crate::{
        socket_event_channel, Bytes, Completion, Error, MessageSocket, ReadyState, Result,
        SocketEvent, SocketEventReceiver, SocketEventSender, StreamEvent, StreamMonitor,
        StreamOptions, Transport,
    };

    #[cfg(feature = "stream")]
    pub use crate::{create_stream, Driver, DuplexStream, StreamAdapter};
}
