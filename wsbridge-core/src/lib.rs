//! wsbridge Core
//!
//! This crate contains the runtime-agnostic building blocks shared by the
//! stream adapter:
//! - Message socket contract and socket events (`socket`)
//! - Socket readiness states (`ready_state`)
//! - Stream options with the adapter-owned fixed settings (`options`)
//! - One-shot operation completions (`completion`)
//! - Stream lifecycle events (`monitor`)
//! - In-memory recording socket for tests and demos (`recording`)
//! - Error types (`error`)

#![deny(unsafe_code)]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::must_use_candidate)]
pub mod completion;
pub mod error;
pub mod monitor;
pub mod options;
pub mod ready_state;
pub mod recording;
pub mod socket;

// Optional: a small prelude to make downstream crates ergonomic.
// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::completion::Completion;
    pub use crate::error::{Error, Result};
    pub use crate::monitor::{StreamEvent, StreamMonitor};
    pub use crate::options::StreamOptions;
    pub use crate::ready_state::ReadyState;
    pub use crate::socket::{
        socket_event_channel, MessageSocket, SocketEvent, SocketEventReceiver, SocketEventSender,
        Transport,
    };
}
