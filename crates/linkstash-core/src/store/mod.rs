//! Device-local cache of posts and tags, scoped per identity.
//!
//! Local reads are synchronous; only the remote side suspends.

mod json_file;
mod memory;

use std::sync::Arc;

use crate::auth::Identity;
use crate::error::Result;
use crate::models::{Post, Tag};
use crate::util::unix_timestamp_ms_now;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Per-identity key-value persistence for the post and tag collections
pub trait LocalStore: Send + Sync {
    /// Cached posts; an unreadable cache loads as empty
    fn load_posts(&self, identity: &Identity) -> Result<Vec<Post>>;

    fn save_posts(&self, identity: &Identity, posts: &[Post]) -> Result<()>;

    /// Cached tags; an unreadable cache loads as empty
    fn load_tags(&self, identity: &Identity) -> Result<Vec<Tag>>;

    fn save_tags(&self, identity: &Identity, tags: &[Tag]) -> Result<()>;
}

/// Insert or replace a post in an identity's cache, matching by URL.
///
/// The post is stamped as modified and unsynced; a replaced post keeps its
/// remote id and creation time.
pub fn upsert_post<L: LocalStore + ?Sized>(
    store: &L,
    identity: &Identity,
    mut post: Post,
) -> Result<Post> {
    let mut posts = store.load_posts(identity)?;

    post.updated_at = Some(unix_timestamp_ms_now());
    post.synced = false;
    match posts.iter_mut().find(|existing| existing.key() == post.key()) {
        Some(existing) => {
            post.id = post.id.or(existing.id);
            post.created_at = existing.created_at.or(post.created_at);
            *existing = post.clone();
        }
        None => posts.push(post.clone()),
    }

    store.save_posts(identity, &posts)?;
    tracing::debug!("Saved {} locally", post.url);
    Ok(post)
}

impl<L: LocalStore> LocalStore for Arc<L> {
    fn load_posts(&self, identity: &Identity) -> Result<Vec<Post>> {
        (**self).load_posts(identity)
    }

    fn save_posts(&self, identity: &Identity, posts: &[Post]) -> Result<()> {
        (**self).save_posts(identity, posts)
    }

    fn load_tags(&self, identity: &Identity) -> Result<Vec<Tag>> {
        (**self).load_tags(identity)
    }

    fn save_tags(&self, identity: &Identity, tags: &[Tag]) -> Result<()> {
        (**self).save_tags(identity, tags)
    }
}
