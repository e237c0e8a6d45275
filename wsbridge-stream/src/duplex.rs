//! Async duplex handle.
//!
//! `DuplexStream` implements `futures::Stream` for the read side and
//! `futures::Sink` for the write side of a [`StreamAdapter`]. The adapter is
//! shared with a [`Driver`] that feeds socket events into it; both live on
//! the same thread.
//!
//! # Examples
//!
//! ```no_run
//! use bytes::Bytes;
//! use futures::{SinkExt, StreamExt};
//! use wsbridge_core::prelude::*;
//! use wsbridge_core::recording::RecordingSocket;
//! use wsbridge_stream::DuplexStream;
//!
//! # async fn example() -> wsbridge_core::error::Result<()> {
//! let (_peer, socket_events) = socket_event_channel();
//! let socket = RecordingSocket::new(ReadyState::Open);
//! let (mut stream, driver) = DuplexStream::new(socket, StreamOptions::default(), socket_events);
//!
//! let client = async move {
//!     stream.send(Bytes::from_static(b"hello")).await?;
//!     while let Some(chunk) = stream.next().await {
//!         println!("received {:?}", chunk?);
//!     }
//!     stream.close().await
//! };
//! let (driven, done) = futures::join!(driver.run(), client);
//! driven?;
//! done
//! # }
//! ```

use bytes::Bytes;
use futures::channel::oneshot;
use futures::sink::Sink;
use futures::stream::Stream;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use tracing::trace;

use wsbridge_core::completion::Completion;
use wsbridge_core::error::{Error, Result};
use wsbridge_core::monitor::{StreamEvent, StreamMonitor};
use wsbridge_core::options::StreamOptions;
use wsbridge_core::socket::{MessageSocket, SocketEventReceiver};

use crate::adapter::StreamAdapter;
use crate::driver::Driver;

/// State shared between the handle and its driver.
pub(crate) struct Shared<S> {
    pub(crate) adapter: StreamAdapter<S>,
    pub(crate) read_waker: Option<Waker>,
}

impl<S> Shared<S> {
    pub(crate) fn wake_reader(&mut self) -> Option<Waker> {
        self.read_waker.take()
    }
}

type Outcome = oneshot::Receiver<Result<()>>;

/// Duplex byte stream over a message socket.
///
/// Dropping the handle destroys the stream.
pub struct DuplexStream<S: MessageSocket> {
    shared: Rc<RefCell<Shared<S>>>,
    events: StreamMonitor,
    kick: flume::Sender<()>,
    /// First stream error seen on `events`
    failure: Option<Error>,
    failure_reported: bool,
    read_done: bool,
    in_flight: VecDeque<(usize, Outcome)>,
    in_flight_bytes: usize,
    write_high_water_mark: usize,
    closing: Option<Outcome>,
    write_closed: bool,
}

impl<S: MessageSocket> DuplexStream<S> {
    /// Wrap `socket`, whose events arrive on `socket_events`.
    ///
    /// The returned [`Driver`] must be polled (usually joined with the code
    /// using the stream) for socket events to reach the stream.
    pub fn new(
        socket: S,
        options: StreamOptions,
        socket_events: SocketEventReceiver,
    ) -> (Self, Driver<S>) {
        let write_high_water_mark = options.write_high_water_mark;
        let mut adapter = StreamAdapter::new(socket, options);
        let events = adapter.subscribe();

        let shared = Rc::new(RefCell::new(Shared {
            adapter,
            read_waker: None,
        }));
        let (kick, kicks) = flume::unbounded();
        let driver = Driver::new(Rc::clone(&shared), socket_events, kicks);

        let stream = Self {
            shared,
            events,
            kick,
            failure: None,
            failure_reported: false,
            read_done: false,
            in_flight: VecDeque::new(),
            in_flight_bytes: 0,
            write_high_water_mark,
            closing: None,
            write_closed: false,
        };
        (stream, driver)
    }

    /// Destroy the stream, optionally with an error.
    ///
    /// The error, if any, is reported to the reader once the socket has
    /// closed. Calling this more than once has no further effect.
    pub fn destroy(&self, error: Option<Error>) {
        self.shared.borrow_mut().adapter.destroy(error, None);
        self.kick();
    }

    /// Subscribe to stream lifecycle events.
    pub fn subscribe(&self) -> StreamMonitor {
        self.shared.borrow_mut().adapter.subscribe()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.borrow().adapter.is_destroyed()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.borrow().adapter.is_closed()
    }

    /// Bytes written but not yet acknowledged by the socket.
    pub fn in_flight_bytes(&self) -> usize {
        self.in_flight_bytes
    }

    /// Ask the driver to run queued ticks.
    fn kick(&self) {
        // Driver gone means nothing is left to run them.
        let _ = self.kick.send(());
    }

    fn collect_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let StreamEvent::Error(err) = event {
                self.failure.get_or_insert(err);
            }
        }
    }

    fn canceled_error(&mut self) -> Error {
        self.collect_events();
        self.failure.clone().unwrap_or(Error::Destroyed)
    }

    /// Reap settled writes, front to back.
    fn poll_in_flight(&mut self, cx: &mut Context<'_>) -> Result<()> {
        while let Some((len, outcome)) = self.in_flight.front_mut() {
            let len = *len;
            let settled = match Pin::new(outcome).poll(cx) {
                Poll::Pending => return Ok(()),
                Poll::Ready(Ok(result)) => result,
                Poll::Ready(Err(oneshot::Canceled)) => Err(self.canceled_error()),
            };
            self.in_flight.pop_front();
            self.in_flight_bytes -= len;
            if settled.is_err() {
                self.shared.borrow_mut().adapter.check_write_failure();
                self.kick();
            }
            settled?;
        }
        Ok(())
    }
}

impl<S: MessageSocket> Stream for DuplexStream<S> {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        this.collect_events();
        if !this.failure_reported {
            if let Some(err) = this.failure.clone() {
                this.failure_reported = true;
                return Poll::Ready(Some(Err(err)));
            }
        }
        if this.read_done {
            return Poll::Ready(None);
        }

        let mut shared = this.shared.borrow_mut();
        if shared.adapter.is_destroyed() {
            // Teardown is in flight; an error may still be on its way.
            if shared.adapter.is_closed() {
                this.read_done = true;
                return Poll::Ready(None);
            }
            shared.read_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        if let Some(chunk) = shared.adapter.read() {
            drop(shared);
            this.kick();
            return Poll::Ready(Some(Ok(chunk)));
        }
        if shared.adapter.is_read_ended() {
            drop(shared);
            trace!("[STREAM] Read side drained");
            this.read_done = true;
            this.kick();
            return Poll::Ready(None);
        }

        shared.read_waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<S: MessageSocket> Sink<Bytes> for DuplexStream<S> {
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = self.get_mut();
        this.poll_in_flight(cx)?;
        if this.in_flight.is_empty() || this.in_flight_bytes < this.write_high_water_mark {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<()> {
        let this = self.get_mut();
        if this.is_destroyed() {
            return Err(this.canceled_error());
        }

        let len = item.len();
        let (completion, outcome) = Completion::channel();
        this.shared.borrow_mut().adapter.write(item, completion);
        this.in_flight.push_back((len, outcome));
        this.in_flight_bytes += len;
        this.kick();
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = self.get_mut();
        this.poll_in_flight(cx)?;
        if this.in_flight.is_empty() {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.write_closed {
            return Poll::Ready(Ok(()));
        }
        futures::ready!(self.as_mut().poll_flush(cx))?;

        let this = self.get_mut();
        if this.closing.is_none() {
            let (completion, outcome) = Completion::channel();
            this.shared.borrow_mut().adapter.end(completion);
            this.kick();
            this.closing = Some(outcome);
        }

        let polled = this.closing.as_mut().map(|outcome| Pin::new(outcome).poll(cx));
        let result = match polled {
            Some(Poll::Pending) => return Poll::Pending,
            Some(Poll::Ready(Ok(result))) => result,
            Some(Poll::Ready(Err(oneshot::Canceled))) | None => Err(this.canceled_error()),
        };
        this.closing = None;
        this.write_closed = result.is_ok();
        Poll::Ready(result)
    }
}

impl<S: MessageSocket> Drop for DuplexStream<S> {
    fn drop(&mut self) {
        // Driver may be mid-step if the handle is dropped from a waker path.
        if let Ok(mut shared) = self.shared.try_borrow_mut() {
            if !shared.adapter.is_destroyed() {
                shared.adapter.destroy(None, None);
            }
        }
        self.kick();
    }
}

impl<S: MessageSocket> std::fmt::Debug for DuplexStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexStream")
            .field("in_flight_bytes", &self.in_flight_bytes)
            .field("read_done", &self.read_done)
            .field("write_closed", &self.write_closed)
            .finish_non_exhaustive()
    }
}
