//! # wsbridge stream
//!
//! Duplex byte stream over an event-driven message socket.
//!
//! ## Overview
//!
//! A message socket (WebSocket-like: connecting, open, closing, closed)
//! delivers whole messages through events and sends whole messages on
//! request. This crate bridges it onto a duplex byte stream:
//! - **Read side**: inbound messages become chunks, with backpressure that
//!   pauses the socket transport while the consumer is behind
//! - **Write side**: chunks become outbound messages, queued while the
//!   socket is still connecting
//! - **Half-close**: ending the write side runs the socket's close handshake
//! - **Destroy**: idempotent teardown with a single terminal close event
//!
//! ## Layers
//!
//! - [`adapter::StreamAdapter`]: sans-IO state machine, one method per input
//! - [`DuplexStream`]: `futures::Stream` + `futures::Sink` handle over the adapter
//! - [`Driver`]: feeds socket events into the adapter and runs queued ticks
//!
//! ## Features
//!
//! - **Zero-copy**: payloads are `Bytes` end to end
//! - **Single-threaded**: `Rc`-shared state, fits thread-per-core runtimes
//! - **Sans-IO core**: testable without any network I/O

// Allow some pedantic lints
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod readable;

pub mod adapter;
pub mod driver;
pub mod duplex;

pub use adapter::{Phase, StreamAdapter};
pub use driver::Driver;
pub use duplex::DuplexStream;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::adapter::{Phase, StreamAdapter};
    pub use crate::driver::Driver;
    pub use crate::duplex::DuplexStream;
    pub use wsbridge_core::prelude::*;
}
