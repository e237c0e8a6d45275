//! In-memory message socket that records every call made on it.
//!
//! `RecordingSocket` implements [`MessageSocket`] without any network I/O.
//! Its state lives behind a shared cell so a [`RecordingProbe`] kept by the
//! caller can inspect and steer it after the socket itself was moved into a
//! stream adapter.
//!
//! ```
//! use bytes::Bytes;
//! use wsbridge_core::completion::Completion;
//! use wsbridge_core::ready_state::ReadyState;
//! use wsbridge_core::recording::{RecordingSocket, SocketCall};
//! use wsbridge_core::socket::MessageSocket;
//!
//! let mut socket = RecordingSocket::new(ReadyState::Open);
//! let probe = socket.probe();
//!
//! socket.send(Bytes::from_static(b"hi"), Completion::noop());
//! assert_eq!(probe.calls(), vec![SocketCall::Send(Bytes::from_static(b"hi"))]);
//! ```

use bytes::Bytes;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

use crate::completion::Completion;
use crate::error::Result;
use crate::ready_state::ReadyState;
use crate::socket::{MessageSocket, Transport};

/// A call observed by the recording socket or its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCall {
    Send(Bytes),
    Close,
    Terminate,
    Pause,
    Resume,
    DelegateDrain,
}

#[derive(Debug)]
struct Record {
    ready_state: ReadyState,
    has_transport: bool,
    needs_drain: bool,
    write_finished: bool,
    paused: bool,
    hold_sends: bool,
    pending_sends: VecDeque<Completion>,
    calls: Vec<SocketCall>,
}

/// Transport half of a [`RecordingSocket`].
#[derive(Debug)]
pub struct RecordingTransport {
    record: Rc<RefCell<Record>>,
}

impl Transport for RecordingTransport {
    fn pause(&mut self) {
        let mut record = self.record.borrow_mut();
        record.paused = true;
        record.calls.push(SocketCall::Pause);
    }

    fn resume(&mut self) {
        let mut record = self.record.borrow_mut();
        record.paused = false;
        record.calls.push(SocketCall::Resume);
    }

    fn is_write_finished(&self) -> bool {
        self.record.borrow().write_finished
    }
}

/// Message socket double that records calls instead of doing I/O.
#[derive(Debug)]
pub struct RecordingSocket {
    record: Rc<RefCell<Record>>,
    transport: RecordingTransport,
}

impl RecordingSocket {
    /// Create a socket in `ready_state`. A transport is assigned unless the
    /// socket is still connecting.
    pub fn new(ready_state: ReadyState) -> Self {
        let record = Rc::new(RefCell::new(Record {
            ready_state,
            has_transport: ready_state != ReadyState::Connecting,
            needs_drain: false,
            write_finished: false,
            paused: false,
            hold_sends: false,
            pending_sends: VecDeque::new(),
            calls: Vec::new(),
        }));
        Self {
            transport: RecordingTransport {
                record: Rc::clone(&record),
            },
            record,
        }
    }

    /// Handle for inspecting and steering this socket.
    pub fn probe(&self) -> RecordingProbe {
        RecordingProbe {
            record: Rc::clone(&self.record),
        }
    }
}

impl MessageSocket for RecordingSocket {
    fn ready_state(&self) -> ReadyState {
        self.record.borrow().ready_state
    }

    fn send(&mut self, payload: Bytes, completion: Completion) {
        trace!("[RECORDING] send {} bytes", payload.len());
        let hold = {
            let mut record = self.record.borrow_mut();
            record.calls.push(SocketCall::Send(payload));
            record.hold_sends
        };
        if hold {
            self.record.borrow_mut().pending_sends.push_back(completion);
        } else {
            completion.complete(Ok(()));
        }
    }

    fn close(&mut self) {
        trace!("[RECORDING] close");
        let mut record = self.record.borrow_mut();
        record.calls.push(SocketCall::Close);
        if record.ready_state == ReadyState::Open {
            record.ready_state = ReadyState::Closing;
        }
    }

    fn terminate(&mut self) {
        trace!("[RECORDING] terminate");
        let mut record = self.record.borrow_mut();
        record.calls.push(SocketCall::Terminate);
        if record.ready_state != ReadyState::Closed {
            record.ready_state = ReadyState::Closing;
        }
    }

    fn receiver_needs_drain(&self) -> bool {
        self.record.borrow().needs_drain
    }

    fn transport(&mut self) -> Option<&mut dyn Transport> {
        if self.record.borrow().has_transport {
            Some(&mut self.transport)
        } else {
            None
        }
    }

    fn delegate_receiver_drain(&mut self) {
        self.record.borrow_mut().calls.push(SocketCall::DelegateDrain);
    }
}

/// Shared view of a [`RecordingSocket`].
#[derive(Debug, Clone)]
pub struct RecordingProbe {
    record: Rc<RefCell<Record>>,
}

impl RecordingProbe {
    /// Move the socket to `state`. Reaching `Open` assigns a transport.
    pub fn set_ready_state(&self, state: ReadyState) {
        let mut record = self.record.borrow_mut();
        record.ready_state = state;
        if state == ReadyState::Open {
            record.has_transport = true;
        }
    }

    /// Assign or remove the transport.
    pub fn set_transport(&self, assigned: bool) {
        self.record.borrow_mut().has_transport = assigned;
    }

    /// Make the receive buffer signal (or stop signalling) "needs drain".
    pub fn set_needs_drain(&self, needs_drain: bool) {
        self.record.borrow_mut().needs_drain = needs_drain;
    }

    /// Mark the transport's writable side finished.
    pub fn set_write_finished(&self, finished: bool) {
        self.record.borrow_mut().write_finished = finished;
    }

    /// Keep send completions pending until [`Self::complete_send`] is called.
    pub fn hold_sends(&self, hold: bool) {
        self.record.borrow_mut().hold_sends = hold;
    }

    /// Complete the oldest held send. Returns false when none was pending.
    pub fn complete_send(&self, result: Result<()>) -> bool {
        let next = self.record.borrow_mut().pending_sends.pop_front();
        match next {
            Some(completion) => {
                completion.complete(result);
                true
            }
            None => false,
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.record.borrow().ready_state
    }

    /// True while the transport is paused.
    pub fn is_paused(&self) -> bool {
        self.record.borrow().paused
    }

    /// Every call observed so far, in order.
    pub fn calls(&self) -> Vec<SocketCall> {
        self.record.borrow().calls.clone()
    }

    /// Number of observed calls equal to `call`.
    pub fn count(&self, call: &SocketCall) -> usize {
        self.record.borrow().calls.iter().filter(|c| *c == call).count()
    }

    /// Payloads sent so far, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.record
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                SocketCall::Send(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }
}
