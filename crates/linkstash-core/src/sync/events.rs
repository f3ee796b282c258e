//! Notifications published by the sync manager.

use crate::models::Post;

/// Broadcast to every subscriber of [`super::SyncManager::subscribe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A pass finished; carries the reconciled post list
    RemoteDataReady(Vec<Post>),
    /// Remote reconciliation failed; carries the cached posts instead
    LocalDataReady(Vec<Post>),
}

impl SyncEvent {
    pub fn posts(&self) -> &[Post] {
        match self {
            Self::RemoteDataReady(posts) | Self::LocalDataReady(posts) => posts,
        }
    }
}
