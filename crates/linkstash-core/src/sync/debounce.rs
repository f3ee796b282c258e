//! Trailing-edge debounce for sync requests.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs only the last of a burst of scheduled tasks, `window` after it was
/// scheduled. Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `task`, superseding whatever is still waiting.
    ///
    /// Once the window has elapsed the task is detached, so a later call
    /// never cancels work that already started.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            tokio::spawn(task);
        });

        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Drop the waiting task, if any
    pub fn cancel(&self) {
        if let Some(timer) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
    }

    /// Whether a task is still waiting for its window to elapse
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_run() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            debouncer.schedule(counting(&runs));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_windows_run_separately() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counting(&runs));
        tokio::time::sleep(Duration::from_secs(3)).await;
        debouncer.schedule(counting(&runs));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_waiting_task() {
        let debouncer = Debouncer::new(Duration::from_secs(2));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.schedule(counting(&runs));
        assert!(debouncer.is_pending());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
