//! Reconciliation engine between the local cache and the remote store.
//!
//! A pass resolves the identity, takes the sync gate, picks a direction by
//! comparing the freshest post on each side and then runs the tag, post and
//! association reconcilers in that direction. Merges are additive: nothing
//! is deleted on either side.

mod associations;
mod debounce;
mod direction;
mod events;
mod manager;
mod posts;
mod queue;
mod state;
mod tags;
#[cfg(test)]
mod testing;

pub use associations::{sync_post_tags, AssociationDelta};
pub use debounce::Debouncer;
pub use direction::{newest_timestamp, resolve_direction, SyncDirection};
pub use events::SyncEvent;
pub use manager::{SyncManager, SyncOutcome, SyncStatus, PUSH_OPERATION};
pub use posts::{dedupe_posts, pull_posts, push_posts, PullSummary, PushSummary};
pub use queue::{OperationFuture, QueueReport, SyncQueue};
pub use state::{SyncErrorEntry, SyncGuard, SyncState, SyncStateHandle};
pub use tags::{find_or_create_tag, merge_into_local, reconcile_tags, TagMap, TagReport};
