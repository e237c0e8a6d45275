//! Message socket contract.
//!
//! This module defines the narrow surface a message socket (a WebSocket
//! connection, typically) has to offer so that a duplex byte stream can be
//! built on top of it:
//! - readiness introspection and the `send` / `close` / `terminate` operations
//! - access to the underlying transport for pause/resume and half-close detection
//! - lifecycle notifications, delivered as `SocketEvent` values
//!
//! Handshake, framing and masking stay inside the socket implementation.

use bytes::Bytes;

use crate::completion::Completion;
use crate::error::Error;
use crate::ready_state::ReadyState;

/// Byte transport underneath a message socket (usually a TCP stream).
pub trait Transport {
    /// Stop reading from the peer.
    fn pause(&mut self);

    /// Start reading from the peer again.
    fn resume(&mut self);

    /// True once the writable side has been shut down and flushed.
    fn is_write_finished(&self) -> bool;
}

/// Message socket consumed by the stream adapter.
///
/// The adapter is the single owner of the socket while it is wrapped.
/// Everything the socket reports back flows through
/// [`SocketEvent`]s fed to the adapter, never through callbacks
/// registered on the socket.
pub trait MessageSocket {
    /// Current lifecycle phase.
    fn ready_state(&self) -> ReadyState;

    /// Send one message. `completion` fires once the payload was written to
    /// the transport, or with the error that prevented it.
    fn send(&mut self, payload: Bytes, completion: Completion);

    /// Start the closing handshake.
    fn close(&mut self);

    /// Drop the connection immediately, without a closing handshake.
    fn terminate(&mut self);

    /// True while the receive buffer wants inbound delivery suspended.
    fn receiver_needs_drain(&self) -> bool;

    /// Underlying transport, `None` until one has been assigned (a client
    /// socket whose handshake never completed has none).
    fn transport(&mut self) -> Option<&mut dyn Transport>;

    /// Hand receive-buffer drain handling over to the caller.
    ///
    /// After this call the socket no longer resumes its transport by itself
    /// when the receive buffer drains; it emits
    /// [`SocketEvent::ReceiverDrain`] instead.
    fn delegate_receiver_drain(&mut self);
}

/// Notifications emitted by a message socket.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Opening handshake completed (`CONNECTING → OPEN`). Emitted once.
    Open,

    /// A complete message arrived.
    Message(Bytes),

    /// The socket failed. Emitted at most once, before `Close`.
    Error(Error),

    /// The connection is closed (`→ CLOSED`). Emitted once.
    Close,

    /// The receive buffer drained after signalling backpressure.
    ReceiverDrain,

    /// The transport's writable side finished.
    TransportFinish,
}

/// Sender used by socket implementations to report events.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Receiving end of a socket's event feed.
pub type SocketEventReceiver = flume::Receiver<SocketEvent>;

/// Creates a new socket event channel pair.
#[must_use]
pub fn socket_event_channel() -> (SocketEventSender, SocketEventReceiver) {
    flume::unbounded()
}
