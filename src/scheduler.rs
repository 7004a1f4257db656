//! Scheduling capabilities injected into the tailer loop.
//!
//! The loop suspends only for the idle and retry delays. Both go through a
//! [`Scheduler`], so production code can park a thread while tests run on
//! virtual time:
//! - [`ThreadScheduler`] waits for real, waking early on cancellation
//! - [`VirtualScheduler`] returns immediately and records each delay

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Why a sleep ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

/// Cooperative sleep primitive for the tailer loop.
pub trait Scheduler {
    /// Suspend the caller for `delay`, returning early with
    /// `Wake::Cancelled` once `cancel` fires.
    fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> Wake;
}

impl<T: Scheduler + ?Sized> Scheduler for &T {
    fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> Wake {
        (**self).sleep(delay, cancel)
    }
}

/// Shared stop signal checked at the top of every loop iteration.
///
/// Cancelling drops the only sender, which disconnects every receiver, so a
/// waiting [`ThreadScheduler`] wakes at once.
#[derive(Clone)]
pub struct CancellationToken {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    /// Fire the token. Idempotent.
    pub fn cancel(&self) {
        self.sender.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block for up to `timeout`. Returns true if cancelled meanwhile.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            // Nothing is ever sent; Ok is unreachable
            Ok(()) | Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Parks the calling thread for the requested delay.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> Wake {
        if cancel.wait_timeout(delay) {
            Wake::Cancelled
        } else {
            Wake::Elapsed
        }
    }
}

type SleepHook = Box<dyn FnMut(usize, Duration) + Send>;

#[derive(Default)]
struct VirtualState {
    now: Duration,
    sleeps: Vec<Duration>,
    budget: Option<usize>,
    hook: Option<SleepHook>,
}

/// Scheduler on virtual time, for tests and simulations.
///
/// Every sleep returns immediately, advances the virtual clock and is
/// recorded. With a sleep budget, the sleep after the budget is spent fires
/// the cancellation token instead, which bounds an otherwise endless loop.
#[derive(Clone, Default)]
pub struct VirtualScheduler {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the loop on the sleep after `sleeps` sleeps have elapsed.
    pub fn with_sleep_budget(self, sleeps: usize) -> Self {
        self.state.lock().budget = Some(sleeps);
        self
    }

    /// Run `hook(index, delay)` during each elapsed sleep, e.g. to append
    /// records or inject faults while the tailer is idle.
    pub fn on_sleep<F>(self, hook: F) -> Self
    where
        F: FnMut(usize, Duration) + Send + 'static,
    {
        self.state.lock().hook = Some(Box::new(hook));
        self
    }

    /// Virtual time elapsed so far.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Every elapsed sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }

    pub fn sleep_count(&self) -> usize {
        self.state.lock().sleeps.len()
    }
}

impl Scheduler for VirtualScheduler {
    fn sleep(&self, delay: Duration, cancel: &CancellationToken) -> Wake {
        let mut state = self.state.lock();

        if let Some(budget) = state.budget {
            if state.sleeps.len() >= budget {
                cancel.cancel();
            }
        }
        if cancel.is_cancelled() {
            return Wake::Cancelled;
        }

        let index = state.sleeps.len();
        state.sleeps.push(delay);
        state.now += delay;

        // Run the hook without holding the lock, so it may inspect us
        let mut hook = state.hook.take();
        drop(state);
        if let Some(ref mut hook) = hook {
            hook(index, delay);
        }
        self.state.lock().hook = hook;

        if cancel.is_cancelled() {
            Wake::Cancelled
        } else {
            Wake::Elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn test_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_cancellation() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_thread_scheduler_wakes_on_cancel() {
        let token = CancellationToken::new();
        let remote = token.clone();

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let started = Instant::now();
        let wake = ThreadScheduler.sleep(Duration::from_secs(30), &token);
        canceller.join().unwrap();

        assert_eq!(wake, Wake::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_thread_scheduler_elapses() {
        let token = CancellationToken::new();
        let started = Instant::now();
        let wake = ThreadScheduler.sleep(Duration::from_millis(20), &token);

        assert_eq!(wake, Wake::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_virtual_scheduler_records_and_advances() {
        let scheduler = VirtualScheduler::new();
        let token = CancellationToken::new();

        scheduler.sleep(Duration::from_millis(500), &token);
        scheduler.sleep(Duration::from_secs(2), &token);

        assert_eq!(
            scheduler.sleeps(),
            vec![Duration::from_millis(500), Duration::from_secs(2)]
        );
        assert_eq!(scheduler.now(), Duration::from_millis(2500));
    }

    #[test]
    fn test_virtual_scheduler_budget_cancels() {
        let scheduler = VirtualScheduler::new().with_sleep_budget(1);
        let token = CancellationToken::new();

        assert_eq!(scheduler.sleep(Duration::from_millis(1), &token), Wake::Elapsed);
        assert_eq!(scheduler.sleep(Duration::from_millis(1), &token), Wake::Cancelled);
        assert!(token.is_cancelled());
        assert_eq!(scheduler.sleep_count(), 1);
    }

    #[test]
    fn test_virtual_scheduler_runs_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let scheduler = VirtualScheduler::new().on_sleep(move |index, _| {
            assert_eq!(index, seen.fetch_add(1, Ordering::SeqCst));
        });
        let token = CancellationToken::new();

        for _ in 0..3 {
            scheduler.sleep(Duration::from_millis(1), &token);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
