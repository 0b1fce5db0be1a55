//! Cross-thread signaling primitives
//!
//! Two small primitives built on `Mutex` + `Condvar`:
//!
//! - [`CaptureSignal`]: a resettable, contextless one-shot gate. The frame
//!   consumer arms it to request exactly one new frame; the capture worker
//!   clears it after delivering, so at most one frame is in flight per
//!   request.
//! - [`CancellationToken`]: a cooperative stop signal. Once cancelled it
//!   stays cancelled; workers observe it through bounded waits so shutdown
//!   is seen within one timeout interval at every suspension point.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Shared boolean flag with timed-wait support.
#[derive(Debug, Default)]
struct Flag {
    state: Mutex<bool>,
    cond: Condvar,
}

impl Flag {
    fn set(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = true;
        self.cond.notify_all();
    }

    fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = false;
    }

    fn get(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the flag is set or `timeout` elapses. Returns the flag
    /// value at the moment the wait ended.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (state, _) = self
            .cond
            .wait_timeout_while(state, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *state
    }
}

/// Pull trigger between the frame consumer and the capture worker.
///
/// Invariant: at most one outstanding request. Arming an already-armed
/// signal is idempotent; the worker clears the signal immediately after
/// enqueueing a frame, so the consumer must re-arm for the next one.
#[derive(Debug, Clone, Default)]
pub struct CaptureSignal {
    inner: Arc<Flag>,
}

impl CaptureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request one frame from the capture worker.
    pub fn request(&self) {
        self.inner.set();
    }

    /// Consume the outstanding request (called by the capture worker after
    /// a frame has been enqueued).
    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn is_requested(&self) -> bool {
        self.inner.get()
    }

    /// Wait up to `timeout` for a request to arrive. Returns true if the
    /// signal is armed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.wait_timeout(timeout)
    }
}

/// Terminal stop signal shared by a worker pair.
///
/// Once cancelled there is no way back; restarting workers requires a fresh
/// token. Workers never clear it themselves.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Flag>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.get()
    }

    /// Bounded wait used at worker suspension points. Returns true if the
    /// token fired, either before the call or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.wait_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn capture_signal_round_trip() {
        let signal = CaptureSignal::new();
        assert!(!signal.is_requested());

        signal.request();
        assert!(signal.is_requested());
        // Arming twice is idempotent
        signal.request();
        assert!(signal.is_requested());

        signal.clear();
        assert!(!signal.is_requested());
    }

    #[test]
    fn wait_returns_immediately_when_armed() {
        let signal = CaptureSignal::new();
        signal.request();

        let start = Instant::now();
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_times_out_when_cleared() {
        let signal = CaptureSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_wakes_on_request_from_other_thread() {
        let signal = CaptureSignal::new();
        let remote = signal.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.request();
        });

        assert!(signal.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn cancellation_is_terminal() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(!token.wait_timeout(Duration::from_millis(10)));

        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.wait_timeout(Duration::from_millis(10)));
        // Clones observe the same state
        assert!(token.clone().is_cancelled());
    }
}
