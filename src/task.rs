//! Task lifecycle primitives: stop tokens and joinable handles
//!
//! **Why**: Every long-running piece of this engine — decode producers,
//! transform workers, playback — must stop on demand and be *awaited* before
//! the caller may reuse the display sink or reset shared records. A dropped
//! sender is the stop signal: it needs no extra state, it wakes timed waits
//! immediately, and it cannot be missed.
//!
//! **Used by**: Pipeline (producer + worker cancellation), PlaybackScheduler
//! (cancellable frame sleep), Viewer (cancel-before-start discipline)

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use log::debug;
use std::thread;
use std::time::Duration;

/// Cancellation signal observed by a running task. Cloneable so one stop
/// order reaches a producer and its whole worker pool.
#[derive(Clone)]
pub struct StopToken {
    rx: Receiver<()>,
}

impl StopToken {
    /// Has the owning handle been dropped?
    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `timeout` or until stopped, whichever comes first.
    /// Returns true if the task was stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        matches!(
            self.rx.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// A token that is already stopped (for tests and degenerate paths).
    pub fn stopped() -> Self {
        let (tx, rx) = bounded::<()>(0);
        drop(tx);
        Self { rx }
    }

    /// A token that never stops on its own.
    pub fn never() -> (StopGuard, Self) {
        let (tx, rx) = bounded::<()>(0);
        (StopGuard { _tx: tx }, Self { rx })
    }
}

/// Keeps a paired `StopToken` un-stopped for as long as it lives.
pub struct StopGuard {
    _tx: Sender<()>,
}

/// A named background task. Cancelling drops the stop sender and joins the
/// thread, so by the time `cancel` returns the task has acknowledged.
pub struct Task {
    name: String,
    stop: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Task {
    /// Spawn `f` on its own thread with a fresh stop token.
    pub fn spawn<F>(name: &str, f: F) -> Self
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        let (tx, rx) = bounded::<()>(0);
        let token = StopToken { rx };
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || f(token))
            .expect("Failed to spawn task thread");
        debug!("Task {} started", name);
        Self {
            name: name.to_string(),
            stop: Some(tx),
            handle: Some(handle),
        }
    }

    /// Signal stop and wait for the task to finish.
    pub fn cancel(mut self) {
        self.cancel_inner();
    }

    /// Wait for natural completion without signalling (keeps the token live
    /// until the thread exits on its own).
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.stop = None;
    }

    fn cancel_inner(&mut self) {
        // Dropping the sender disconnects every cloned token
        self.stop = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("Task {} stopped", self.name);
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.cancel_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    /// Test: a live token reports not-stopped and waits full timeouts
    #[test]
    fn test_token_live() {
        let (_guard, token) = StopToken::never();
        assert!(!token.is_stopped());

        let start = Instant::now();
        assert!(!token.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    /// Test: cancel interrupts a timed wait early and joins the thread
    #[test]
    fn test_cancel_interrupts_wait() {
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped2 = Arc::clone(&stopped);

        let task = Task::spawn("test-wait", move |stop| {
            // Far longer than the test runs; cancel must cut it short
            if stop.wait(Duration::from_secs(30)) {
                stopped2.store(true, Ordering::Relaxed);
            }
        });

        let start = Instant::now();
        task.cancel();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(stopped.load(Ordering::Relaxed));
    }

    /// Test: cancel returns only after the task body has finished
    #[test]
    fn test_cancel_joins() {
        let steps = Arc::new(AtomicUsize::new(0));
        let steps2 = Arc::clone(&steps);

        let task = Task::spawn("test-join", move |stop| {
            while !stop.wait(Duration::from_millis(1)) {}
            // Post-stop cleanup must be visible after cancel()
            std::thread::sleep(Duration::from_millis(20));
            steps2.fetch_add(1, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(10));
        task.cancel();
        assert_eq!(steps.load(Ordering::SeqCst), 1);
    }

    /// Test: cloned tokens all observe the same stop order
    #[test]
    fn test_cloned_tokens() {
        let (guard, token) = StopToken::never();
        let clones: Vec<StopToken> = (0..4).map(|_| token.clone()).collect();
        drop(guard);
        assert!(token.is_stopped());
        for c in &clones {
            assert!(c.is_stopped());
        }
    }

    /// Test: pre-stopped token
    #[test]
    fn test_stopped() {
        let token = StopToken::stopped();
        assert!(token.is_stopped());
        assert!(token.wait(Duration::from_millis(1)));
    }
}
