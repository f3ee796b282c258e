//! Sync gate and status.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Entries kept in the error log before the oldest are dropped
const MAX_ERROR_LOG: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Observable sync status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncState {
    pub is_syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub error_log: Vec<SyncErrorEntry>,
}

impl SyncState {
    /// Raise the gate; `false` when a pass already holds it
    pub fn start_sync(&mut self) -> bool {
        if self.is_syncing {
            return false;
        }
        self.is_syncing = true;
        true
    }

    /// Lower the gate, stamping success or logging the failure
    pub fn end_sync(&mut self, outcome: Result<(), String>) {
        self.is_syncing = false;
        self.record(outcome);
    }

    fn record(&mut self, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => self.last_sync_time = Some(Utc::now()),
            Err(message) => {
                if self.error_log.len() >= MAX_ERROR_LOG {
                    self.error_log.remove(0);
                }
                self.error_log.push(SyncErrorEntry {
                    at: Utc::now(),
                    message,
                });
            }
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: SyncState,
    /// Bumped whenever the gate is forced open, so stale guards can tell
    generation: u64,
}

#[derive(Debug, Default)]
struct Inner {
    shared: Mutex<Shared>,
    released: Notify,
}

/// Shared handle to the sync gate; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct SyncStateHandle {
    inner: Arc<Inner>,
}

impl SyncStateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // the state stays consistent across a panic, so recover it
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current status snapshot
    pub fn snapshot(&self) -> SyncState {
        self.lock().state.clone()
    }

    pub fn is_syncing(&self) -> bool {
        self.lock().state.is_syncing
    }

    /// Take the gate without waiting
    pub fn try_begin(&self) -> Option<SyncGuard> {
        let mut shared = self.lock();
        if !shared.state.start_sync() {
            return None;
        }
        Some(SyncGuard::new(self.clone(), shared.generation))
    }

    /// Wait until the gate is free, then take it
    pub async fn begin(&self) -> SyncGuard {
        loop {
            if let Some(guard) = self.try_begin() {
                return guard;
            }
            self.inner.released.notified().await;
        }
    }

    /// Take the gate even if a pass holds it.
    ///
    /// The pass that held it keeps running, but its guard no longer lowers
    /// the gate when it finishes.
    pub fn force_begin(&self) -> SyncGuard {
        let mut shared = self.lock();
        if shared.state.is_syncing {
            tracing::warn!("Forcing the sync gate open over a running pass");
        }
        shared.generation += 1;
        shared.state.is_syncing = true;
        SyncGuard::new(self.clone(), shared.generation)
    }

    fn end(&self, generation: u64, outcome: Result<(), String>) {
        {
            let mut shared = self.lock();
            if shared.generation == generation {
                shared.state.end_sync(outcome);
            } else {
                shared.state.record(outcome);
                return;
            }
        }
        self.inner.released.notify_one();
    }
}

/// Holds the sync gate; lowers it when finished or dropped
#[derive(Debug)]
#[must_use = "dropping the guard ends the sync pass"]
pub struct SyncGuard {
    handle: SyncStateHandle,
    generation: u64,
    finished: bool,
}

impl SyncGuard {
    const fn new(handle: SyncStateHandle, generation: u64) -> Self {
        Self {
            handle,
            generation,
            finished: false,
        }
    }

    /// End the pass, recording its outcome
    pub fn finish(mut self, outcome: Result<(), String>) {
        self.finished = true;
        self.handle.end(self.generation, outcome);
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.handle
                .end(self.generation, Err("sync pass aborted".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn gate_admits_one_pass_at_a_time() {
        let state = SyncStateHandle::new();
        let guard = state.try_begin().unwrap();
        assert!(state.is_syncing());
        assert!(state.try_begin().is_none());

        guard.finish(Ok(()));
        assert!(!state.is_syncing());
        assert!(state.snapshot().last_sync_time.is_some());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn failure_is_logged_and_gate_released() {
        let state = SyncStateHandle::new();
        state.try_begin().unwrap().finish(Err("boom".to_string()));

        let snapshot = state.snapshot();
        assert!(!snapshot.is_syncing);
        assert!(snapshot.last_sync_time.is_none());
        assert_eq!(snapshot.error_log.len(), 1);
        assert_eq!(snapshot.error_log[0].message, "boom");
    }

    #[test]
    fn dropped_guard_releases_the_gate() {
        let state = SyncStateHandle::new();
        drop(state.try_begin().unwrap());

        assert!(!state.is_syncing());
        assert_eq!(state.snapshot().error_log[0].message, "sync pass aborted");
    }

    #[test]
    fn stale_guard_does_not_lower_a_forced_gate() {
        let state = SyncStateHandle::new();
        let stale = state.try_begin().unwrap();
        let forced = state.force_begin();

        stale.finish(Ok(()));
        assert!(state.is_syncing());

        forced.finish(Ok(()));
        assert!(!state.is_syncing());
    }

    #[test]
    fn error_log_is_bounded() {
        let mut state = SyncState::default();
        for n in 0..MAX_ERROR_LOG + 5 {
            assert!(state.start_sync());
            state.end_sync(Err(n.to_string()));
        }
        assert_eq!(state.error_log.len(), MAX_ERROR_LOG);
        assert_eq!(state.error_log[0].message, "5");
    }

    #[tokio::test]
    async fn begin_waits_for_release() {
        let state = SyncStateHandle::new();
        let held = state.try_begin().unwrap();

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.begin().await.finish(Ok(())) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        held.finish(Ok(()));
        waiter.await.unwrap();
        assert!(!state.is_syncing());
    }
}
