//! Sync orchestration: identity, gate, direction, reconcilers and events.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::{Identity, IdentityProvider};
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::models::{Post, TagRef};
use crate::remote::RemoteStore;
use crate::store::{upsert_post, LocalStore};
use crate::sync::debounce::Debouncer;
use crate::sync::direction::{resolve_direction, SyncDirection};
use crate::sync::events::SyncEvent;
use crate::sync::posts::{dedupe_posts, pull_posts, push_posts, PullSummary, PushSummary};
use crate::sync::queue::{QueueReport, SyncQueue};
use crate::sync::state::{SyncGuard, SyncState, SyncStateHandle};
use crate::sync::tags::{merge_into_local, reconcile_tags, TagMap};

const EVENT_CAPACITY: usize = 16;

/// Queue name used by [`SyncManager::enqueue_push`]
pub const PUSH_OPERATION: &str = "push-local-changes";

/// What a sync entry point ended up doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum SyncOutcome {
    /// Another pass held the gate
    Skipped,
    InSync,
    Pushed(PushSummary),
    Pulled(PullSummary),
    Forced {
        push: PushSummary,
        pull: Option<PullSummary>,
    },
}

/// Gate status plus the queue backlog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    #[serde(flatten)]
    pub state: SyncState,
    #[serde(default)]
    pub pending_operations: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Initial,
    Directed,
    Forced { skip_pull: bool },
}

/// Coordinates every reconciliation between the local cache and the remote
pub struct SyncManager<L, R, I> {
    local: L,
    remote: R,
    identity: I,
    settings: SyncSettings,
    state: SyncStateHandle,
    queue: SyncQueue,
    debouncer: Debouncer,
    events: broadcast::Sender<SyncEvent>,
}

impl<L, R, I> SyncManager<L, R, I>
where
    L: LocalStore + 'static,
    R: RemoteStore + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(local: L, remote: R, identity: I, settings: SyncSettings) -> Self {
        let state = SyncStateHandle::new();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            local,
            remote,
            identity,
            queue: SyncQueue::new(state.clone(), settings.max_retries, settings.retry_delay()),
            debouncer: Debouncer::new(settings.debounce_window()),
            settings,
            state,
            events,
        }
    }

    pub const fn local(&self) -> &L {
        &self.local
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn state(&self) -> &SyncStateHandle {
        &self.state
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state.snapshot(),
            pending_operations: self.queue.pending_names(),
        }
    }

    /// The identity this pass runs as, refreshing an expired session once
    pub async fn resolve_identity(&self) -> Result<Identity> {
        if let Some(session) = self.identity.current_session() {
            if !session.is_expired() {
                return Ok(session.user);
            }
            tracing::info!("Session expired; refreshing before sync");
            let refreshed = self.identity.refresh_session().await?;
            return Ok(refreshed.user);
        }
        self.identity.current_identity().ok_or(Error::NoIdentity)
    }

    /// First-load sync: a remote with any posts always wins, an empty
    /// remote is seeded from the cache.
    pub async fn init_smart_sync(&self) -> Result<SyncOutcome> {
        let Some(guard) = self.state.try_begin() else {
            tracing::debug!("Initial sync skipped; a pass is already running");
            return Ok(SyncOutcome::Skipped);
        };
        self.run(guard, Pass::Initial).await
    }

    /// Timestamp-directed sync. Returns [`SyncOutcome::Skipped`] at once
    /// when another pass holds the gate.
    pub async fn sync_data(&self) -> Result<SyncOutcome> {
        let Some(guard) = self.state.try_begin() else {
            tracing::debug!("Sync skipped; a pass is already running");
            return Ok(SyncOutcome::Skipped);
        };
        self.run(guard, Pass::Directed).await
    }

    /// Push everything local regardless of timestamps, then pull the
    /// canonical result back unless `skip_apply_remote_to_local` is set.
    /// Takes the gate even when another pass holds it.
    pub async fn force_sync(&self, skip_apply_remote_to_local: bool) -> Result<SyncOutcome> {
        let guard = self.state.force_begin();
        self.run(
            guard,
            Pass::Forced {
                skip_pull: skip_apply_remote_to_local,
            },
        )
        .await
    }

    /// Schedule [`Self::sync_data`] after the debounce window, superseding
    /// any sync still waiting
    pub fn debounced_sync(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        self.debouncer.schedule(async move {
            if let Err(error) = manager.sync_data().await {
                tracing::warn!("Debounced sync failed: {}", error);
            }
        });
    }

    /// Insert or replace a post in the local cache by URL
    pub async fn save_local_post(&self, post: Post) -> Result<Post> {
        let identity = self.resolve_identity().await?;
        upsert_post(&self.local, &identity, post)
    }

    /// [`Self::save_local_post`] followed by a debounced sync
    pub async fn upsert_local_post(self: &Arc<Self>, post: Post) -> Result<Post> {
        let saved = self.save_local_post(post).await?;
        self.debounced_sync();
        Ok(saved)
    }

    /// Queue an arbitrary operation; it runs under the gate on the next
    /// [`Self::process_queue`]
    pub fn enqueue<F, Fut>(&self, name: impl Into<String>, operation: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.queue.enqueue(name, operation);
    }

    /// Queue a push of the local cache to the remote
    pub fn enqueue_push(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        self.queue.enqueue(PUSH_OPERATION, move || {
            let manager = Arc::clone(&manager);
            async move { manager.push_local_changes().await.map(|_| ()) }
        });
    }

    pub async fn process_queue(&self) -> QueueReport {
        self.queue.process().await
    }

    /// Push the local cache without touching the gate; callers hold it
    async fn push_local_changes(&self) -> Result<PushSummary> {
        let identity = self.resolve_identity().await?;
        let local_posts = self.local.load_posts(&identity)?;
        let remote_posts = self.remote.get_posts().await?;
        self.push(&identity, local_posts, &remote_posts).await
    }

    async fn run(&self, guard: SyncGuard, pass: Pass) -> Result<SyncOutcome> {
        let result = match self.resolve_identity().await {
            Ok(identity) => {
                let result = self.execute(&identity, pass).await;
                if let Err(error) = &result {
                    tracing::error!("Sync pass failed: {}", error);
                    self.publish_cached(&identity);
                }
                result
            }
            Err(error) => {
                tracing::error!("Sync pass aborted: {}", error);
                Err(error)
            }
        };

        guard.finish(result.as_ref().map(|_| ()).map_err(ToString::to_string));
        result
    }

    async fn execute(&self, identity: &Identity, pass: Pass) -> Result<SyncOutcome> {
        let local_posts = self.local.load_posts(identity)?;
        let remote_posts = self.remote.get_posts().await?;

        match pass {
            Pass::Initial => {
                if remote_posts.is_empty() {
                    if local_posts.is_empty() {
                        self.publish(SyncEvent::RemoteDataReady(Vec::new()));
                        return Ok(SyncOutcome::InSync);
                    }
                    tracing::info!("Remote is empty; seeding it from the local cache");
                    let summary = self.push(identity, local_posts, &remote_posts).await?;
                    return Ok(SyncOutcome::Pushed(summary));
                }
                let summary = self.pull(identity, local_posts, remote_posts).await?;
                Ok(SyncOutcome::Pulled(summary))
            }
            Pass::Directed => {
                let direction = resolve_direction(
                    &local_posts,
                    &remote_posts,
                    self.settings.direction_threshold(),
                );
                tracing::info!("Sync direction: {direction}");
                match direction {
                    SyncDirection::LocalToCloud => {
                        let summary = self.push(identity, local_posts, &remote_posts).await?;
                        Ok(SyncOutcome::Pushed(summary))
                    }
                    SyncDirection::CloudToLocal => {
                        let summary = self.pull(identity, local_posts, remote_posts).await?;
                        Ok(SyncOutcome::Pulled(summary))
                    }
                    SyncDirection::InSync => {
                        self.publish(SyncEvent::RemoteDataReady(local_posts));
                        Ok(SyncOutcome::InSync)
                    }
                }
            }
            Pass::Forced { skip_pull } => {
                tracing::info!("Forcing a push of {} local posts", local_posts.len());
                let push = self.push(identity, local_posts, &remote_posts).await?;
                if skip_pull {
                    return Ok(SyncOutcome::Forced { push, pull: None });
                }
                let local_posts = self.local.load_posts(identity)?;
                let remote_posts = self.remote.get_posts().await?;
                let pull = self.pull(identity, local_posts, remote_posts).await?;
                Ok(SyncOutcome::Forced {
                    push,
                    pull: Some(pull),
                })
            }
        }
    }

    async fn push(
        &self,
        identity: &Identity,
        local_posts: Vec<Post>,
        remote_posts: &[Post],
    ) -> Result<PushSummary> {
        let local_posts = dedupe_posts(local_posts);
        let local_tags = self.local.load_tags(identity)?;

        let wanted: Vec<TagRef> = local_tags
            .iter()
            .map(TagRef::from)
            .chain(local_posts.iter().flat_map(|post| post.tags.iter().cloned()))
            .collect();
        let (mut tags, tag_report) = reconcile_tags(&self.remote, &wanted).await?;
        tracing::debug!(
            "Tags reconciled: {} created, {} recolored, {} failed",
            tag_report.created,
            tag_report.recolored,
            tag_report.failed
        );

        let (pushed, summary) = push_posts(&self.remote, local_posts, remote_posts, &mut tags).await;

        self.local.save_posts(identity, &pushed)?;
        self.local
            .save_tags(identity, &merge_into_local(&local_tags, &tags))?;
        self.publish(SyncEvent::RemoteDataReady(pushed));
        Ok(summary)
    }

    async fn pull(
        &self,
        identity: &Identity,
        local_posts: Vec<Post>,
        remote_posts: Vec<Post>,
    ) -> Result<PullSummary> {
        let (merged, summary) = pull_posts(&self.remote, local_posts, remote_posts).await?;
        let remote_tags = TagMap::from_remote(self.remote.get_tags().await?);
        let local_tags = self.local.load_tags(identity)?;

        self.local.save_posts(identity, &merged)?;
        self.local
            .save_tags(identity, &merge_into_local(&local_tags, &remote_tags))?;
        self.publish(SyncEvent::RemoteDataReady(merged));
        Ok(summary)
    }

    /// Fall back to whatever the cache holds
    fn publish_cached(&self, identity: &Identity) {
        match self.local.load_posts(identity) {
            Ok(posts) => self.publish(SyncEvent::LocalDataReady(posts)),
            Err(error) => tracing::warn!("Cached posts unavailable: {}", error),
        }
    }

    fn publish(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No sync event subscribers");
        }
    }
}
