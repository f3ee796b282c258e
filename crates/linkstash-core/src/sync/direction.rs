//! Sync direction resolution.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::Post;

/// Which side a reconciliation pass treats as the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDirection {
    LocalToCloud,
    CloudToLocal,
    InSync,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LocalToCloud => "local -> cloud",
            Self::CloudToLocal => "cloud -> local",
            Self::InSync => "in sync",
        })
    }
}

/// Newest `updatedAt ?? createdAt` in a collection, epoch zero when empty
pub fn newest_timestamp(posts: &[Post]) -> i64 {
    posts.iter().map(Post::freshness).max().unwrap_or(0)
}

/// Pick a direction by comparing the freshest post on each side.
///
/// An empty side always syncs toward the non-empty one. Otherwise a side
/// must be ahead by more than `threshold` to win; anything closer is
/// clock skew and counts as in sync.
pub fn resolve_direction(local: &[Post], remote: &[Post], threshold: Duration) -> SyncDirection {
    match (local.is_empty(), remote.is_empty()) {
        (true, true) => return SyncDirection::InSync,
        (false, true) => return SyncDirection::LocalToCloud,
        (true, false) => return SyncDirection::CloudToLocal,
        (false, false) => {}
    }

    let threshold = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
    let newest_local = newest_timestamp(local);
    let newest_remote = newest_timestamp(remote);

    let direction = if newest_local > newest_remote.saturating_add(threshold) {
        SyncDirection::LocalToCloud
    } else if newest_remote > newest_local.saturating_add(threshold) {
        SyncDirection::CloudToLocal
    } else {
        SyncDirection::InSync
    };
    tracing::debug!(
        "Resolved direction {direction}: newest local={newest_local} remote={newest_remote}"
    );
    direction
}
