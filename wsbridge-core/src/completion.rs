//! One-shot completion handles.
//!
//! A `Completion` is handed along with every write, final and destroy
//! request and is invoked exactly once when the operation settles. It is
//! consumed by `complete`, so a second invocation cannot compile.
//!
//! Dropping a `Completion` without completing it is how pending requests
//! are discarded (for example writes still queued behind the opening
//! handshake when the stream is destroyed). A channel-backed completion
//! reports that as `oneshot::Canceled` on its receiver.

use crate::error::Result;
use futures::channel::oneshot;
use std::fmt;

/// Callback invoked once with the outcome of a stream operation.
pub struct Completion {
    callback: Box<dyn FnOnce(Result<()>)>,
}

impl Completion {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<()>) + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A completion that ignores the outcome.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// A completion paired with a receiver that resolves to the outcome.
    ///
    /// ```
    /// use wsbridge_core::completion::Completion;
    ///
    /// let (completion, mut rx) = Completion::channel();
    /// completion.complete(Ok(()));
    /// assert!(matches!(rx.try_recv(), Ok(Some(Ok(())))));
    /// ```
    pub fn channel() -> (Self, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |result| {
            // Receiver gone means nobody waits for the outcome anymore.
            let _ = tx.send(result);
        });
        (completion, rx)
    }

    /// Invoke the callback with the outcome.
    #[inline]
    pub fn complete(self, result: Result<()>) {
        (self.callback)(result);
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}
