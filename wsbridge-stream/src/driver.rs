//! Event driver for [`DuplexStream`](crate::DuplexStream).
//!
//! The driver owns the receiving end of the socket event feed. For each
//! socket event, and for each tick request from the handle, it steps the
//! shared adapter, runs queued ticks and wakes a parked reader.

use futures::{select, FutureExt};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

use wsbridge_core::error::Result;
use wsbridge_core::socket::{MessageSocket, SocketEvent, SocketEventReceiver};

use crate::duplex::Shared;

enum Input {
    Socket(SocketEvent),
    /// Handle requested a tick run
    Kick,
    /// Socket event feed closed
    Hangup,
}

/// Pumps socket events into a duplex stream.
///
/// Run it on the same thread as the stream, typically by joining
/// [`Driver::run`] with the code that uses the stream.
pub struct Driver<S> {
    shared: Rc<RefCell<Shared<S>>>,
    socket_events: SocketEventReceiver,
    kicks: flume::Receiver<()>,
}

impl<S: MessageSocket> Driver<S> {
    pub(crate) fn new(
        shared: Rc<RefCell<Shared<S>>>,
        socket_events: SocketEventReceiver,
        kicks: flume::Receiver<()>,
    ) -> Self {
        Self {
            shared,
            socket_events,
            kicks,
        }
    }

    /// Drive the stream until its terminal close.
    ///
    /// Also returns `Ok` when the socket event feed is closed. A stream
    /// error emitted while nothing listens for it (the handle is gone and
    /// no monitor is subscribed) is returned as `Err`.
    pub async fn run(self) -> Result<()> {
        debug!("[DRIVER] Started");
        let mut kicks_open = true;

        loop {
            let input = if kicks_open {
                select! {
                    event = self.socket_events.recv_async().fuse() => match event {
                        Ok(event) => Input::Socket(event),
                        Err(_) => Input::Hangup,
                    },
                    kick = self.kicks.recv_async().fuse() => {
                        if kick.is_err() {
                            trace!("[DRIVER] Handle gone");
                            kicks_open = false;
                        }
                        Input::Kick
                    }
                }
            } else {
                match self.socket_events.recv_async().await {
                    Ok(event) => Input::Socket(event),
                    Err(_) => Input::Hangup,
                }
            };

            let hangup = matches!(input, Input::Hangup);
            let (result, closed) = self.step(input);
            result?;

            if closed {
                debug!("[DRIVER] Stream closed");
                return Ok(());
            }
            if hangup {
                debug!("[DRIVER] Socket event feed closed");
                return Ok(());
            }
        }
    }

    fn step(&self, input: Input) -> (Result<()>, bool) {
        let (result, closed, waker) = {
            let mut shared = self.shared.borrow_mut();
            if let Input::Socket(event) = input {
                trace!("[DRIVER] Socket event: {:?}", event);
                shared.adapter.handle_socket_event(event);
            }
            let result = shared.adapter.run_ticks();
            let closed = shared.adapter.is_closed();
            (result, closed, shared.wake_reader())
        };

        // Outside the borrow: the reader re-enters the shared state.
        if let Some(waker) = waker {
            waker.wake();
        }
        (result, closed)
    }
}

impl<S> std::fmt::Debug for Driver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("pending_events", &self.socket_events.len())
            .finish_non_exhaustive()
    }
}
