//! Call debouncing
//!
//! Coalesces bursts of calls into one:
//! - Trailing edge (default): runs once the window passes with no new call,
//!   with the latest call's argument
//! - Leading edge (`immediate`): runs on the first call of a burst and
//!   suppresses the rest until the window closes
//!
//! Every call restarts the window.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Debounced wrapper around a function of one argument
pub struct Debounce<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for Debounce<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<A> {
    func: Box<dyn Fn(A) + Send + Sync>,
    wait: Duration,
    immediate: bool,
    handle: Handle,
    state: Mutex<State<A>>,
}

struct State<A> {
    timer: Option<AbortHandle>,
    /// Bumped on every call so a timer that lost the race to `abort` is ignored
    generation: u64,
    latest: Option<A>,
}

impl<A: Send + 'static> Debounce<A> {
    /// Wrap `func`; timers are spawned on `handle`
    pub fn new<F>(handle: Handle, wait: Duration, immediate: bool, func: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                func: Box::new(func),
                wait,
                immediate,
                handle,
                state: Mutex::new(State {
                    timer: None,
                    generation: 0,
                    latest: None,
                }),
            }),
        }
    }

    /// Invoke the wrapper
    pub fn call(&self, arg: A) {
        let run_now = {
            let mut state = self.inner.state.lock();
            let leading = self.inner.immediate && state.timer.is_none();

            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.generation += 1;
            let generation = state.generation;

            let run_now = if self.inner.immediate {
                leading.then_some(arg)
            } else {
                state.latest = Some(arg);
                None
            };

            let inner = Arc::clone(&self.inner);
            let task = self.inner.handle.spawn(async move {
                tokio::time::sleep(inner.wait).await;
                inner.expire(generation);
            });
            state.timer = Some(task.abort_handle());
            run_now
        };

        if let Some(arg) = run_now {
            (self.inner.func)(arg);
        }
    }

    /// Whether a window is currently open
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    /// Close the window without running a pending trailing call
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.latest = None;
    }
}

impl<A> Inner<A> {
    fn expire(&self, generation: u64) {
        let latest = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            state.latest.take()
        };

        if !self.immediate {
            if let Some(arg) = latest {
                (self.func)(arg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        (calls, move |v| sink.lock().push(v))
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_edge_uses_latest_argument() {
        let (calls, f) = recorder();
        let debounced = Debounce::new(Handle::current(), Duration::from_millis(100), false, f);

        debounced.call(1);
        debounced.call(2);
        debounced.call(3);
        assert!(calls.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*calls.lock(), vec![3]);
        assert!(!debounced.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_call_restarts_window() {
        let (calls, f) = recorder();
        let debounced = Debounce::new(Handle::current(), Duration::from_millis(100), false, f);

        debounced.call(1);
        tokio::time::sleep(Duration::from_millis(60)).await;
        debounced.call(2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        // 120ms since the first call, only 60ms since the last
        assert!(calls.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(*calls.lock(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_edge_fires_once_per_burst() {
        let (calls, f) = recorder();
        let debounced = Debounce::new(Handle::current(), Duration::from_millis(100), true, f);

        debounced.call(1);
        assert_eq!(*calls.lock(), vec![1]);

        debounced.call(2);
        debounced.call(3);
        tokio::time::sleep(Duration::from_millis(150)).await;
        // No trailing call in immediate mode
        assert_eq!(*calls.lock(), vec![1]);

        // Window closed: next call leads a new burst
        debounced.call(4);
        assert_eq!(*calls.lock(), vec![1, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_trailing_call() {
        let (calls, f) = recorder();
        let debounced = Debounce::new(Handle::current(), Duration::from_millis(100), false, f);

        debounced.call(1);
        debounced.cancel();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(calls.lock().is_empty());
    }
}
