//! Stream adapter
//!
//! Sans-IO state machine that turns a message socket into a duplex byte
//! stream. It coordinates three parties:
//!
//! ```text
//!   consumer (read demand)      producer (writes, final)
//!            ↑                          ↓
//!        StreamAdapter  ← this module
//!            ↑                          ↓
//!   socket events (open, message,   MessageSocket (send, close,
//!   error, close, drain, finish)    terminate, pause/resume)
//! ```
//!
//! Every input is a method call and none of them block. Work that must not
//! happen in the same turn as its trigger (terminal close, error and end
//! emission) is queued and executed by [`StreamAdapter::run_ticks`].
//!
//! # Backpressure
//!
//! A message that fills the read buffer pauses the socket transport.
//! Inbound flow reopens only when the consumer asks for more data *and*
//! the socket's receive buffer is not signalling "needs drain"; whichever
//! of the two comes last resumes the transport.
//!
//! # Teardown
//!
//! Destroy is idempotent. While the socket is not yet closed, the destroy
//! completes on the socket's `Error` or `Close` event, whichever comes
//! first; the socket is terminated unless a socket error already started
//! a graceful close whose close frame must be allowed out.

use bytes::Bytes;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, error, trace};

use wsbridge_core::completion::Completion;
use wsbridge_core::error::{Error, Result};
use wsbridge_core::monitor::{create_monitor, StreamEvent, StreamEventSender, StreamMonitor};
use wsbridge_core::options::StreamOptions;
use wsbridge_core::ready_state::ReadyState;
use wsbridge_core::socket::{MessageSocket, SocketEvent};

use crate::readable::ReadBuffer;

/// Adapter lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Socket still connecting, writes and final are queued
    AwaitingOpen,
    /// Socket open, data flows both ways
    Active,
    /// Write side ending or socket closed, not yet destroyed
    Closing,
    /// Destroy started
    Destroyed,
}

/// Receive-buffer drain handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainListener {
    /// Taken over once the socket opens
    Deferred,
    Attached,
}

/// Operation parked until the socket opens.
#[derive(Debug)]
enum Deferred {
    Write { chunk: Bytes, completion: Completion },
    Final(Completion),
}

/// Destroy waiting for the socket to report `Error` or `Close`.
#[derive(Debug)]
struct DestroyWait {
    error: Option<Error>,
    completion: Option<Completion>,
    called: bool,
}

#[derive(Debug)]
enum Tick {
    End,
    Finish,
    Error(Error),
    Close,
}

/// Duplex byte stream over a [`MessageSocket`].
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use wsbridge_core::prelude::*;
/// use wsbridge_core::recording::RecordingSocket;
/// use wsbridge_stream::adapter::StreamAdapter;
///
/// let socket = RecordingSocket::new(ReadyState::Open);
/// let mut adapter = StreamAdapter::new(socket, StreamOptions::default());
///
/// adapter.handle_socket_event(SocketEvent::Message(Bytes::from_static(b"hello")));
/// assert_eq!(adapter.read().as_deref(), Some(&b"hello"[..]));
/// ```
pub struct StreamAdapter<S> {
    socket: S,
    phase: Phase,
    resume_on_drain: bool,
    terminate_on_destroy: bool,
    drain: DrainListener,
    readable: ReadBuffer,
    end_scheduled: bool,
    /// `end` was called on the write side
    ending: bool,
    /// The write side completed its final step
    finished: bool,
    /// Destroy completed with an error
    errored: bool,
    close_emitted: bool,
    awaiting_open: SmallVec<[Deferred; 4]>,
    finish_wait: Option<Completion>,
    stalled_final: Option<Completion>,
    destroy_wait: Option<DestroyWait>,
    /// First error reported by a dispatched write's completion
    write_failure: Rc<RefCell<Option<Error>>>,
    seen_socket_error: bool,
    seen_socket_close: bool,
    ticks: VecDeque<Tick>,
    monitors: Vec<StreamEventSender>,
}

impl<S: MessageSocket> StreamAdapter<S> {
    /// Wrap `socket`.
    ///
    /// Receive-buffer drain handling is taken over right away when the
    /// socket is past the opening handshake, or as soon as it opens.
    pub fn new(socket: S, options: StreamOptions) -> Self {
        let state = socket.ready_state();
        debug!(
            "[STREAM] Wrapping {} socket (read hwm {}, auto_destroy={}, emit_close={}, object_mode={})",
            state,
            options.read_high_water_mark,
            StreamOptions::AUTO_DESTROY,
            StreamOptions::EMIT_CLOSE,
            StreamOptions::OBJECT_MODE,
        );

        let phase = match state {
            ReadyState::Connecting => Phase::AwaitingOpen,
            ReadyState::Open => Phase::Active,
            ReadyState::Closing | ReadyState::Closed => Phase::Closing,
        };

        let mut adapter = Self {
            socket,
            phase,
            resume_on_drain: true,
            terminate_on_destroy: true,
            drain: DrainListener::Deferred,
            readable: ReadBuffer::new(options.read_high_water_mark),
            end_scheduled: false,
            ending: false,
            finished: false,
            errored: false,
            close_emitted: false,
            awaiting_open: SmallVec::new(),
            finish_wait: None,
            stalled_final: None,
            destroy_wait: None,
            write_failure: Rc::new(RefCell::new(None)),
            seen_socket_error: false,
            seen_socket_close: false,
            ticks: VecDeque::new(),
            monitors: Vec::new(),
        };

        if state != ReadyState::Connecting {
            adapter.attach_drain_listener();
        }
        adapter
    }

    /// Feed one socket event into the adapter.
    pub fn handle_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Open => self.on_open(),
            SocketEvent::Message(payload) => self.on_message(payload),
            SocketEvent::Error(err) => self.on_socket_error(err),
            SocketEvent::Close => self.on_socket_close(),
            SocketEvent::ReceiverDrain => self.on_receiver_drain(),
            SocketEvent::TransportFinish => self.on_transport_finish(),
        }
    }

    // =========================
    // Read side
    // =========================

    /// Take the next buffered chunk.
    ///
    /// Returns `None` when nothing is buffered. Once end-of-data has been
    /// reached, `StreamEvent::End` is emitted on the next tick.
    pub fn read(&mut self) -> Option<Bytes> {
        let chunk = self.readable.pop();
        if self.readable.is_drained() {
            self.schedule_end();
        } else if self.readable.wants_more() && !self.is_destroyed() {
            self.read_more();
        }
        chunk
    }

    /// Downstream demand: the consumer can take more data.
    pub fn read_more(&mut self) {
        if !self.socket.ready_state().is_established() || self.resume_on_drain {
            return;
        }
        self.resume_on_drain = true;
        if self.socket.receiver_needs_drain() {
            trace!("[STREAM] Demand back, waiting for receiver drain");
        } else {
            self.resume_transport();
        }
    }

    fn on_message(&mut self, payload: Bytes) {
        trace!("[STREAM] Message of {} bytes", payload.len());
        if !self.push(payload) {
            trace!("[STREAM] Read buffer full, pausing transport");
            self.resume_on_drain = false;
            if let Some(transport) = self.socket.transport() {
                transport.pause();
            }
        }
    }

    fn push(&mut self, chunk: Bytes) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.readable.push(chunk)
    }

    fn on_receiver_drain(&mut self) {
        if self.drain == DrainListener::Attached && self.resume_on_drain {
            self.resume_transport();
        }
    }

    fn resume_transport(&mut self) {
        if let Some(transport) = self.socket.transport() {
            trace!("[STREAM] Resuming transport");
            transport.resume();
        }
    }

    fn attach_drain_listener(&mut self) {
        if self.drain == DrainListener::Deferred {
            self.socket.delegate_receiver_drain();
            self.drain = DrainListener::Attached;
        }
    }

    // =========================
    // Write side
    // =========================

    /// Write one message. `completion` fires when the socket has sent it.
    ///
    /// While the socket is connecting the write is queued and replayed, in
    /// submission order, once it opens.
    pub fn write(&mut self, chunk: Bytes, completion: Completion) {
        if self.is_destroyed() {
            completion.complete(Err(Error::Destroyed));
            return;
        }
        if self.ending {
            completion.complete(Err(Error::WriteAfterEnd));
            return;
        }
        self.dispatch_write(chunk, completion);
    }

    fn dispatch_write(&mut self, chunk: Bytes, completion: Completion) {
        if self.socket.ready_state() == ReadyState::Connecting {
            trace!("[STREAM] Socket connecting, queueing write");
            self.awaiting_open.push(Deferred::Write { chunk, completion });
            return;
        }

        let failure = Rc::clone(&self.write_failure);
        let completion = Completion::new(move |result| {
            if let Err(err) = &result {
                failure.borrow_mut().get_or_insert_with(|| err.clone());
            }
            completion.complete(result);
        });
        self.socket.send(chunk, completion);
        self.check_write_failure();
    }

    /// Destroy the stream if a dispatched write failed since the last check.
    ///
    /// Sockets may complete sends at any time; this also runs at the start
    /// of [`Self::run_ticks`].
    pub fn check_write_failure(&mut self) {
        let failure = self.write_failure.borrow_mut().take();
        if let Some(err) = failure {
            debug!("[STREAM] Write failed: {}", err);
            self.destroy(Some(err), None);
        }
    }

    /// End the write side (half-close). `completion` fires once the
    /// transport's writable side has finished.
    ///
    /// Callers must let every previous write complete first.
    pub fn end(&mut self, completion: Completion) {
        if self.is_destroyed() {
            completion.complete(Err(Error::Destroyed));
            return;
        }
        if self.ending {
            completion.complete(Err(Error::WriteAfterEnd));
            return;
        }
        self.ending = true;
        self.run_final(completion);
    }

    fn run_final(&mut self, completion: Completion) {
        if self.socket.ready_state() == ReadyState::Connecting {
            trace!("[STREAM] Socket connecting, queueing final");
            self.awaiting_open.push(Deferred::Final(completion));
            return;
        }

        // A client whose handshake failed never gets a transport. The
        // socket reports that failure as an error, which destroys us.
        let write_finished = match self.socket.transport() {
            Some(transport) => transport.is_write_finished(),
            None => {
                debug!("[STREAM] No transport assigned, final waits for socket error");
                self.stalled_final = Some(completion);
                return;
            }
        };

        if write_finished {
            self.finish_write(completion);
            if self.readable.end_emitted() {
                self.destroy(None, None);
            }
        } else {
            // Destroy happens later, through socket close and end of the
            // read side, so that end-of-data reaches the consumer first.
            self.finish_wait = Some(completion);
            if self.phase == Phase::Active {
                self.phase = Phase::Closing;
            }
            debug!("[STREAM] Write side ending, closing socket");
            self.socket.close();
        }
    }

    fn on_transport_finish(&mut self) {
        if let Some(completion) = self.finish_wait.take() {
            self.finish_write(completion);
        }
    }

    fn finish_write(&mut self, completion: Completion) {
        // Set now rather than with the Finish tick: an End tick queued
        // ahead of it must already see the write side as finished.
        self.finished = true;
        completion.complete(Ok(()));
        self.ticks.push_back(Tick::Finish);
    }

    // =========================
    // Lifecycle
    // =========================

    fn on_open(&mut self) {
        debug!("[STREAM] Socket open");
        self.attach_drain_listener();
        if self.phase == Phase::AwaitingOpen {
            self.phase = Phase::Active;
        }

        let queued = std::mem::take(&mut self.awaiting_open);
        if !queued.is_empty() {
            debug!("[STREAM] Replaying {} deferred operations", queued.len());
        }
        for op in queued {
            if self.is_destroyed() {
                break;
            }
            match op {
                Deferred::Write { chunk, completion } => self.dispatch_write(chunk, completion),
                Deferred::Final(completion) => self.run_final(completion),
            }
        }
    }

    fn on_socket_error(&mut self, err: Error) {
        debug!("[STREAM] Socket error: {}", err);

        if let Some(wait) = self.destroy_wait.as_mut() {
            if !wait.called {
                wait.called = true;
                let completion = wait.completion.take();
                self.complete_destroy(Some(err.clone()), completion);
            }
        }

        if std::mem::replace(&mut self.seen_socket_error, true) || self.is_destroyed() {
            return;
        }
        // The socket is already closing gracefully after its own error;
        // terminating now could cut off the close frame.
        self.terminate_on_destroy = false;
        self.destroy(Some(err), None);
    }

    fn on_socket_close(&mut self) {
        debug!("[STREAM] Socket closed");

        if !std::mem::replace(&mut self.seen_socket_close, true) && !self.is_destroyed() {
            self.readable.push_eof();
            self.phase = Phase::Closing;
        }

        if let Some(wait) = self.destroy_wait.take() {
            if !wait.called {
                self.complete_destroy(wait.error, wait.completion);
            }
            self.ticks.push_back(Tick::Close);
        }
    }

    /// Tear the stream down, optionally with an error.
    ///
    /// Only the first call does anything; later calls complete their
    /// `completion` with `Ok` right away. When the socket is already closed
    /// the destroy completes immediately, otherwise it completes on the
    /// socket's next `Error` or `Close` event. `StreamEvent::Close` follows
    /// on a later tick.
    pub fn destroy(&mut self, error: Option<Error>, completion: Option<Completion>) {
        if self.is_destroyed() {
            if let Some(completion) = completion {
                completion.complete(Ok(()));
            }
            return;
        }

        match &error {
            Some(err) => debug!("[STREAM] Destroying: {}", err),
            None => debug!("[STREAM] Destroying"),
        }
        self.phase = Phase::Destroyed;
        self.awaiting_open.clear();
        self.finish_wait = None;
        self.stalled_final = None;

        if self.socket.ready_state() == ReadyState::Closed {
            self.complete_destroy(error, completion);
            self.ticks.push_back(Tick::Close);
            return;
        }

        self.destroy_wait = Some(DestroyWait {
            error,
            completion,
            called: false,
        });

        if self.terminate_on_destroy {
            self.socket.terminate();
        } else {
            debug!("[STREAM] Leaving close handshake in flight");
        }
    }

    fn complete_destroy(&mut self, error: Option<Error>, completion: Option<Completion>) {
        if let Some(err) = &error {
            self.errored = true;
            self.ticks.push_back(Tick::Error(err.clone()));
        }
        if let Some(completion) = completion {
            completion.complete(error.map_or(Ok(()), Err));
        }
    }

    fn schedule_end(&mut self) {
        if !self.end_scheduled {
            self.end_scheduled = true;
            self.ticks.push_back(Tick::End);
        }
    }

    /// Run work queued for the next tick.
    ///
    /// Returns the first stream error emitted while no monitor was
    /// subscribed; such an error has no other way to reach the caller.
    pub fn run_ticks(&mut self) -> Result<()> {
        let mut unhandled = None;
        self.check_write_failure();

        while let Some(tick) = self.ticks.pop_front() {
            match tick {
                Tick::End => {
                    if self.errored || self.close_emitted || self.readable.end_emitted() {
                        continue;
                    }
                    self.readable.mark_end_emitted();
                    self.emit(StreamEvent::End);
                    if !self.is_destroyed() && self.finished {
                        self.destroy(None, None);
                    }
                }
                Tick::Finish => self.emit(StreamEvent::Finish),
                Tick::Error(err) => {
                    self.emit(StreamEvent::Error(err.clone()));
                    if self.monitors.is_empty() {
                        error!("[STREAM] Unhandled stream error: {}", err);
                        unhandled.get_or_insert(err);
                    }
                }
                Tick::Close => {
                    if !self.close_emitted {
                        self.close_emitted = true;
                        self.emit(StreamEvent::Close);
                    }
                }
            }
        }

        unhandled.map_or(Ok(()), Err)
    }

    fn emit(&mut self, event: StreamEvent) {
        trace!("[STREAM] {}", event);
        self.monitors.retain(|monitor| monitor.send(event.clone()).is_ok());
    }

    /// Subscribe to stream lifecycle events.
    pub fn subscribe(&mut self) -> StreamMonitor {
        let (tx, rx) = create_monitor();
        self.monitors.push(tx);
        rx
    }

    // =========================
    // Introspection
    // =========================

    pub fn ready_state(&self) -> ReadyState {
        self.socket.ready_state()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.phase == Phase::Destroyed
    }

    /// True once the terminal `StreamEvent::Close` has been emitted.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.close_emitted
    }

    /// True when end-of-data was reached and every chunk has been read.
    #[inline]
    pub fn is_read_ended(&self) -> bool {
        self.readable.is_drained()
    }

    /// True once end-of-data has been pushed, even if chunks remain.
    #[inline]
    pub fn is_eof_pushed(&self) -> bool {
        self.readable.is_ended()
    }

    /// True once the write side completed its final step.
    #[inline]
    pub fn is_write_finished(&self) -> bool {
        self.finished
    }

    /// Bytes buffered for the consumer.
    #[inline]
    pub fn read_buffered(&self) -> usize {
        self.readable.len()
    }

    #[inline]
    pub fn has_pending_ticks(&self) -> bool {
        !self.ticks.is_empty()
    }

    /// Get a reference to the underlying socket.
    pub fn get_ref(&self) -> &S {
        &self.socket
    }

    /// Get a mutable reference to the underlying socket.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.socket
    }
}

impl<S> std::fmt::Debug for StreamAdapter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("phase", &self.phase)
            .field("resume_on_drain", &self.resume_on_drain)
            .field("terminate_on_destroy", &self.terminate_on_destroy)
            .field("read_buffered", &self.readable.len())
            .field("queued", &self.awaiting_open.len())
            .finish_non_exhaustive()
    }
}
