//! Process-wide run state.
//!
//! Flags that every scan checks at its boundaries live here instead of in
//! globals. One [`RunContext`] is created at startup and shared by `Arc`.

use std::error::Error;
use std::fmt::Write as _;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct RunContext {
    exiting: AtomicBool,
    exit_signal: Notify,
    show_stacktraces: bool,
}

impl RunContext {
    pub fn new(show_stacktraces: bool) -> Self {
        Self { show_stacktraces, ..Self::default() }
    }

    /// Asks every in-flight scan to stop, waking any that are waiting in [`Self::sleep`].
    pub fn request_exit(&self) {
        self.exiting.store(true, Ordering::SeqCst);
        self.exit_signal.notify_waiters();
    }

    #[inline]
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    /// Resolves once exit has been requested.
    pub async fn exit_requested(&self) {
        let mut notified = pin!(self.exit_signal.notified());
        // Register before checking the flag so a concurrent request_exit is not missed.
        notified.as_mut().enable();
        if self.is_exiting() {
            return;
        }
        notified.await;
    }

    /// Waits for `delay`, returning `false` early if exit is requested meanwhile.
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => !self.is_exiting(),
            () = self.exit_requested() => false,
        }
    }

    #[inline]
    pub fn show_stacktraces(&self) -> bool {
        self.show_stacktraces
    }

    /// Renders an error for the operator.
    ///
    /// Only the top-level message is shown unless stack traces are enabled,
    /// in which case every source in the chain is appended.
    pub fn describe(&self, error: &(dyn Error + 'static)) -> String {
        let mut message = error.to_string();
        if self.show_stacktraces() {
            let mut source = error.source();
            while let Some(cause) = source {
                let _ = write!(message, "\n  caused by: {cause}");
                source = cause.source();
            }
        }
        message
    }
}
