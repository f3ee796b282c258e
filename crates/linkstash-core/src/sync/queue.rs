//! FIFO queue of sync operations with bounded retry.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::sync::state::SyncStateHandle;

pub type OperationFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

type Operation = Arc<dyn Fn() -> OperationFuture + Send + Sync>;

struct QueuedOperation {
    name: String,
    retries: u32,
    run: Operation,
}

/// What one [`SyncQueue::process`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueReport {
    pub completed: usize,
    pub retried: usize,
    pub dropped: usize,
}

/// Operations run one at a time, in order, each under the sync gate.
///
/// A failed operation goes back to the head of the queue after a delay,
/// up to `max_retries` times; after that it is dropped and the failure
/// lands in the error log.
pub struct SyncQueue {
    pending: Mutex<VecDeque<QueuedOperation>>,
    processing: AtomicBool,
    state: SyncStateHandle,
    max_retries: u32,
    retry_delay: Duration,
}

impl SyncQueue {
    pub fn new(state: SyncStateHandle, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            state,
            max_retries,
            retry_delay,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedOperation>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an operation; it runs on the next [`Self::process`]
    pub fn enqueue<F, Fut>(&self, name: impl Into<String>, operation: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!("Queued sync operation {name}");
        self.lock().push_back(QueuedOperation {
            name,
            retries: 0,
            run: Arc::new(move || Box::pin(operation()) as OperationFuture),
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names of the queued operations, head first
    pub fn pending_names(&self) -> Vec<String> {
        self.lock().iter().map(|op| op.name.clone()).collect()
    }

    /// Drain the queue. Returns at once when another call is already
    /// draining it.
    pub async fn process(&self) -> QueueReport {
        let mut report = QueueReport::default();
        let Some(_processing) = ProcessingFlag::acquire(&self.processing) else {
            tracing::debug!("Sync queue is already being processed");
            return report;
        };

        loop {
            let Some(mut op) = self.lock().pop_front() else {
                break;
            };

            let guard = self.state.begin().await;
            let result = (op.run)().await;

            match result {
                Ok(()) => {
                    guard.finish(Ok(()));
                    report.completed += 1;
                }
                Err(error) if op.retries < self.max_retries => {
                    op.retries += 1;
                    tracing::warn!(
                        "Sync operation {} failed (attempt {}/{}): {}",
                        op.name,
                        op.retries,
                        self.max_retries + 1,
                        error
                    );
                    guard.finish(Err(format!("{}: {error}", op.name)));
                    report.retried += 1;
                    self.lock().push_front(op);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(error) => {
                    tracing::error!(
                        "Dropping sync operation {} after {} retries: {}",
                        op.name,
                        op.retries,
                        error
                    );
                    guard.finish(Err(format!(
                        "{}: dropped after {} retries: {error}",
                        op.name, op.retries
                    )));
                    report.dropped += 1;
                }
            }
        }

        report
    }
}

/// Clears the processing flag when the drain ends or is cancelled
struct ProcessingFlag<'a>(&'a AtomicBool);

impl<'a> ProcessingFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ProcessingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
