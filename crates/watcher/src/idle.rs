//! Idle-time scheduling
//!
//! Low-priority callbacks that run when the host reports idle time, or
//! after a timeout at the latest so work still happens under constant load.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::AbortHandle;
use tracing::trace;

/// Identifies a requested idle callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleHandle(u64);

/// Passed to idle callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleDeadline {
    /// The callback ran because its timeout elapsed, not because of idle time
    pub did_timeout: bool,
}

/// Callback run at idle time
pub type IdleCallback = Box<dyn FnOnce(IdleDeadline) + Send>;

/// Host facility for low-priority callbacks
///
/// Implementations must not run the callback synchronously from inside
/// `request_idle`.
pub trait IdleScheduler: Send + Sync {
    /// Run `callback` at the next idle period, or after `timeout`
    fn request_idle(&self, callback: IdleCallback, timeout: Duration) -> IdleHandle;

    /// Cancel a callback that has not run yet; no-op otherwise
    fn cancel_idle(&self, handle: IdleHandle);
}

/// Lets the host announce idle periods
#[derive(Clone, Debug)]
pub struct IdleSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for IdleSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSignal {
    /// Create a signal nobody has fired yet
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Announce an idle period to every callback requested before now
    pub fn notify_idle(&self) {
        self.tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// [`IdleScheduler`] backed by tokio tasks
pub struct TokioIdleScheduler {
    handle: Handle,
    signal: IdleSignal,
    next_id: AtomicU64,
    tasks: Arc<DashMap<u64, AbortHandle>>,
}

impl TokioIdleScheduler {
    /// Create a scheduler spawning on `handle` and woken by `signal`
    pub fn new(handle: Handle, signal: IdleSignal) -> Self {
        Self {
            handle,
            signal,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// The signal the host should fire when idle
    pub fn signal(&self) -> IdleSignal {
        self.signal.clone()
    }

    /// Callbacks requested but not yet run or cancelled
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl IdleScheduler for TokioIdleScheduler {
    fn request_idle(&self, callback: IdleCallback, timeout: Duration) -> IdleHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut idle = self.signal.subscribe();
        let tasks = Arc::clone(&self.tasks);
        let (armed_tx, armed_rx) = oneshot::channel::<()>();

        let task = self.handle.spawn(async move {
            // Wait until the handle is registered so removal below cannot race it
            let _ = armed_rx.await;

            // A dropped signal disables the first branch, leaving the timeout
            let did_timeout = tokio::select! {
                Ok(()) = idle.changed() => false,
                _ = tokio::time::sleep(timeout) => true,
            };

            tasks.remove(&id);
            trace!(id, did_timeout, "idle callback firing");
            callback(IdleDeadline { did_timeout });
        });

        self.tasks.insert(id, task.abort_handle());
        let _ = armed_tx.send(());
        IdleHandle(id)
    }

    fn cancel_idle(&self, handle: IdleHandle) {
        if let Some((_, task)) = self.tasks.remove(&handle.0) {
            task.abort();
            trace!(id = handle.0, "idle callback cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn scheduler() -> TokioIdleScheduler {
        TokioIdleScheduler::new(Handle::current(), IdleSignal::new())
    }

    fn record(into: &Arc<Mutex<Vec<IdleDeadline>>>) -> IdleCallback {
        let into = Arc::clone(into);
        Box::new(move |deadline| into.lock().push(deadline))
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_callback() {
        let sched = scheduler();
        let fired = Arc::new(Mutex::new(Vec::new()));
        sched.request_idle(record(&fired), Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*fired.lock(), vec![IdleDeadline { did_timeout: true }]);
        assert_eq!(sched.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_signal_runs_before_timeout() {
        let sched = scheduler();
        let fired = Arc::new(Mutex::new(Vec::new()));
        sched.request_idle(record(&fired), Duration::from_secs(10));

        sched.signal().notify_idle();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(*fired.lock(), vec![IdleDeadline { did_timeout: false }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_callback() {
        let sched = scheduler();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let handle = sched.request_idle(record(&fired), Duration::from_millis(50));
        sched.cancel_idle(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.lock().is_empty());
        assert_eq!(sched.pending(), 0);

        // Cancelling twice is harmless
        sched.cancel_idle(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_before_request_is_not_counted() {
        let sched = scheduler();
        sched.signal().notify_idle();

        let fired = Arc::new(Mutex::new(Vec::new()));
        sched.request_idle(record(&fired), Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(*fired.lock(), vec![IdleDeadline { did_timeout: true }]);
    }
}
