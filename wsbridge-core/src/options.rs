//! Stream configuration options
//!
//! Options accepted by the duplex stream built around a message socket.
//! A few stream behaviours are owned by the adapter and cannot be set by
//! callers; they are exposed as associated constants instead of fields.

/// Default read-side high water mark (16KB)
pub const DEFAULT_READ_HIGH_WATER_MARK: usize = 16 * 1024;

/// Default write-side high water mark (16KB)
pub const DEFAULT_WRITE_HIGH_WATER_MARK: usize = 16 * 1024;

/// Duplex stream configuration.
///
/// # Examples
///
/// ```
/// use wsbridge_core::options::StreamOptions;
///
/// let opts = StreamOptions::default()
///     .with_read_high_water_mark(64 * 1024)
///     .with_write_high_water_mark(4 * 1024);
///
/// assert!(!StreamOptions::AUTO_DESTROY);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Read high water mark (bytes)
    ///
    /// Once this many bytes are buffered for the consumer, further pushes
    /// report the buffer as full and the socket transport is paused.
    /// - Default: 16384
    /// - `0`: every push reports full, giving strict pull-driven delivery
    pub read_high_water_mark: usize,

    /// Write high water mark (bytes)
    ///
    /// Maximum number of bytes handed to the socket whose send completion
    /// has not fired yet. The async handle stops accepting writes above it.
    /// - Default: 16384
    pub write_high_water_mark: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            read_high_water_mark: DEFAULT_READ_HIGH_WATER_MARK,
            write_high_water_mark: DEFAULT_WRITE_HIGH_WATER_MARK,
        }
    }
}

impl StreamOptions {
    /// Teardown on end is sequenced by the adapter, never automatic.
    pub const AUTO_DESTROY: bool = false;

    /// The terminal close event is emitted by the adapter once the socket
    /// has really closed, never by the stream itself.
    pub const EMIT_CLOSE: bool = false;

    /// Chunks are raw bytes, never structured objects.
    pub const OBJECT_MODE: bool = false;

    /// Create new stream options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set read high water mark.
    pub fn with_read_high_water_mark(mut self, hwm: usize) -> Self {
        self.read_high_water_mark = hwm;
        self
    }

    /// Set write high water mark.
    pub fn with_write_high_water_mark(mut self, hwm: usize) -> Self {
        self.write_high_water_mark = hwm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = StreamOptions::default();
        assert_eq!(opts.read_high_water_mark, 16384);
        assert_eq!(opts.write_high_water_mark, 16384);
        assert_eq!(opts, StreamOptions::new());
    }

    #[test]
    fn test_builder() {
        let opts = StreamOptions::new()
            .with_read_high_water_mark(1)
            .with_write_high_water_mark(2);
        assert_eq!(opts.read_high_water_mark, 1);
        assert_eq!(opts.write_high_water_mark, 2);
    }
}
