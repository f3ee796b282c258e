//! Remote store adapter.
//!
//! CRUD over the remote Post, Tag and post-tag collections. Every
//! implementation is scoped to one owner when it is constructed, so none of
//! these calls take an identity.

mod repository;

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{AssociatedTag, Post, PostDraft, PostId, PostPatch, Tag, TagDraft, TagId, TagPatch};

pub use repository::LibSqlRemoteStore;

/// Relational remote store consumed by the sync engine
pub trait RemoteStore: Send + Sync {
    /// All posts of the owner, with their tags resolved
    fn get_posts(&self) -> impl Future<Output = Result<Vec<Post>>> + Send;

    /// Create a post; never writes associations
    fn create_post(&self, draft: &PostDraft) -> impl Future<Output = Result<Post>> + Send;

    /// Update the given scalar fields of a post
    fn update_post(
        &self,
        id: &PostId,
        patch: &PostPatch,
    ) -> impl Future<Output = Result<Post>> + Send;

    fn get_tags(&self) -> impl Future<Output = Result<Vec<Tag>>> + Send;

    /// Create a tag, or return the existing one with the same name
    fn create_tag(&self, draft: &TagDraft) -> impl Future<Output = Result<Tag>> + Send;

    fn update_tag(&self, id: &TagId, patch: &TagPatch)
        -> impl Future<Output = Result<Tag>> + Send;

    /// Tags currently linked to one post
    fn get_post_tag_associations(
        &self,
        post_id: &PostId,
    ) -> impl Future<Output = Result<Vec<Tag>>> + Send;

    /// Every association row of the owner, with tags resolved
    fn get_all_post_tag_associations(
        &self,
    ) -> impl Future<Output = Result<Vec<AssociatedTag>>> + Send;

    /// Link tags to a post; `false` when some link could not be made
    fn add_associations(
        &self,
        post_id: &PostId,
        tag_ids: &[TagId],
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Unlink tags from a post
    fn remove_associations(
        &self,
        post_id: &PostId,
        tag_ids: &[TagId],
    ) -> impl Future<Output = Result<bool>> + Send;
}

impl<R: RemoteStore> RemoteStore for Arc<R> {
    fn get_posts(&self) -> impl Future<Output = Result<Vec<Post>>> + Send {
        (**self).get_posts()
    }

    fn create_post(&self, draft: &PostDraft) -> impl Future<Output = Result<Post>> + Send {
        (**self).create_post(draft)
    }

    fn update_post(
        &self,
        id: &PostId,
        patch: &PostPatch,
    ) -> impl Future<Output = Result<Post>> + Send {
        (**self).update_post(id, patch)
    }

    fn get_tags(&self) -> impl Future<Output = Result<Vec<Tag>>> + Send {
        (**self).get_tags()
    }

    fn create_tag(&self, draft: &TagDraft) -> impl Future<Output = Result<Tag>> + Send {
        (**self).create_tag(draft)
    }

    fn update_tag(
        &self,
        id: &TagId,
        patch: &TagPatch,
    ) -> impl Future<Output = Result<Tag>> + Send {
        (**self).update_tag(id, patch)
    }

    fn get_post_tag_associations(
        &self,
        post_id: &PostId,
    ) -> impl Future<Output = Result<Vec<Tag>>> + Send {
        (**self).get_post_tag_associations(post_id)
    }

    fn get_all_post_tag_associations(
        &self,
    ) -> impl Future<Output = Result<Vec<AssociatedTag>>> + Send {
        (**self).get_all_post_tag_associations()
    }

    fn add_associations(
        &self,
        post_id: &PostId,
        tag_ids: &[TagId],
    ) -> impl Future<Output = Result<bool>> + Send {
        (**self).add_associations(post_id, tag_ids)
    }

    fn remove_associations(
        &self,
        post_id: &PostId,
        tag_ids: &[TagId],
    ) -> impl Future<Output = Result<bool>> + Send {
        (**self).remove_associations(post_id, tag_ids)
    }
}
