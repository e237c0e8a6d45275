//! Message socket readiness states.
//!
//! This module provides the `ReadyState` enum describing which lifecycle
//! phase a message socket is in.

use std::fmt;

/// Message socket lifecycle phase.
///
/// States only move forward: `Connecting → Open → Closing → Closed`, with
/// `Closed` reachable from any earlier state and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Opening handshake in progress
    Connecting = 0,

    /// Handshake complete, messages flow in both directions
    Open = 1,

    /// Closing handshake started
    Closing = 2,

    /// Connection fully closed
    Closed = 3,
}

impl ReadyState {
    /// Get the state as a string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }

    /// True once the opening handshake completed and the socket is not
    /// yet closed.
    #[inline]
    pub const fn is_established(&self) -> bool {
        matches!(self, Self::Open | Self::Closing)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_display() {
        assert_eq!(ReadyState::Connecting.to_string(), "CONNECTING");
        assert_eq!(ReadyState::Closed.to_string(), "CLOSED");
    }

    #[test]
    fn test_established() {
        assert!(!ReadyState::Connecting.is_established());
        assert!(ReadyState::Open.is_established());
        assert!(ReadyState::Closing.is_established());
        assert!(!ReadyState::Closed.is_established());
    }

    #[test]
    fn test_ordering_follows_lifecycle() {
        assert!((ReadyState::Connecting as u8) < (ReadyState::Open as u8));
        assert!((ReadyState::Closing as u8) < (ReadyState::Closed as u8));
    }
}
