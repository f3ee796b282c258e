//! In-memory [`RemoteStore`] that records every write, for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::{
    AssociatedTag, Post, PostDraft, PostId, PostPatch, Tag, TagDraft, TagId, TagPatch, TagRef,
};
use crate::remote::RemoteStore;
use crate::util::natural_key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreatePost { url: String },
    UpdatePost { id: PostId },
    CreateTag { name: String },
    UpdateTag { id: TagId },
    AddAssociations { post_id: PostId, tag_ids: Vec<TagId> },
    RemoveAssociations { post_id: PostId, tag_ids: Vec<TagId> },
}

#[derive(Debug, Default)]
struct Inner {
    posts: Vec<Post>,
    tags: Vec<Tag>,
    links: Vec<(PostId, TagId)>,
    writes: Vec<RemoteCall>,
    failing_posts: HashSet<String>,
    failing_tags: HashSet<String>,
    clock: i64,
}

impl Inner {
    /// Wall-clock milliseconds, strictly increasing between calls
    fn tick(&mut self) -> i64 {
        self.clock = chrono::Utc::now().timestamp_millis().max(self.clock + 1);
        self.clock
    }

    fn tags_of(&self, post_id: &PostId) -> Vec<Tag> {
        self.links
            .iter()
            .filter(|(post, _)| post == post_id)
            .filter_map(|(_, tag_id)| self.tags.iter().find(|tag| tag.id == Some(*tag_id)))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct RecordingRemote {
    inner: Mutex<Inner>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
    post_reads: AtomicUsize,
}

impl RecordingRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Remote("remote unreachable".to_string()));
        }
        Ok(())
    }

    /// Delay every `get_posts` call
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// How many times `get_posts` was called
    pub fn post_reads(&self) -> usize {
        self.post_reads.load(Ordering::SeqCst)
    }

    /// Make every call fail until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make creating or updating the post with this URL fail
    pub fn fail_post(&self, url: &str) {
        self.lock().failing_posts.insert(natural_key(url));
    }

    /// Make creating the tag with this name fail
    pub fn fail_tag(&self, name: &str) {
        self.lock().failing_tags.insert(natural_key(name));
    }

    /// Insert a post without recording a write; its tags are ignored
    pub fn seed_post(&self, mut post: Post) -> Post {
        post.id = Some(post.id.unwrap_or_default());
        post.tags.clear();
        post.synced = false;
        self.lock().posts.push(post.clone());
        post
    }

    pub fn seed_tag(&self, mut tag: Tag) -> Tag {
        tag.id = Some(tag.id.unwrap_or_default());
        self.lock().tags.push(tag.clone());
        tag
    }

    pub fn link(&self, post_id: &PostId, tag: Tag) {
        if let Some(tag_id) = tag.id {
            self.lock().links.push((*post_id, tag_id));
        }
    }

    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }

    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().tags.iter().map(|tag| tag.name.clone()).collect();
        names.sort();
        names
    }

    /// Sorted names of the tags linked to a post
    pub fn post_tag_names(&self, post_id: &PostId) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .tags_of(post_id)
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        names.sort();
        names
    }

    pub fn writes(&self) -> Vec<RemoteCall> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }
}

impl RemoteStore for RecordingRemote {
    async fn get_posts(&self) -> Result<Vec<Post>> {
        self.post_reads.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.check_online()?;
        let inner = self.lock();
        Ok(inner
            .posts
            .iter()
            .map(|post| {
                let mut post = post.clone();
                if let Some(id) = post.id {
                    post.tags = inner.tags_of(&id).iter().map(TagRef::from).collect();
                }
                post
            })
            .collect())
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post> {
        self.check_online()?;
        let mut inner = self.lock();
        let key = natural_key(&draft.url);
        inner.writes.push(RemoteCall::CreatePost {
            url: draft.url.clone(),
        });
        if inner.failing_posts.contains(&key) {
            return Err(Error::Remote(format!("rejected post {}", draft.url)));
        }
        if let Some(existing) = inner.posts.iter().find(|post| post.key() == key) {
            return Ok(existing.clone());
        }

        let now = inner.tick();
        let post = Post {
            id: Some(PostId::new()),
            url: draft.url.clone(),
            platform: draft.platform,
            title: draft.title.clone(),
            description: draft.description.clone(),
            tags: Vec::new(),
            created_at: draft.created_at.or(Some(now)),
            updated_at: Some(now),
            synced: false,
        };
        inner.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: &PostId, patch: &PostPatch) -> Result<Post> {
        self.check_online()?;
        let mut inner = self.lock();
        inner.writes.push(RemoteCall::UpdatePost { id: *id });
        let now = inner.tick();
        let failing = inner.failing_posts.clone();
        let post = inner
            .posts
            .iter_mut()
            .find(|post| post.id == Some(*id))
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if failing.contains(&post.key()) {
            return Err(Error::Remote(format!("rejected post {}", post.url)));
        }
        if let Some(platform) = patch.platform {
            post.platform = platform;
        }
        if let Some(title) = &patch.title {
            post.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            post.description.clone_from(description);
        }
        post.updated_at = Some(now);
        Ok(post.clone())
    }

    async fn get_tags(&self) -> Result<Vec<Tag>> {
        self.check_online()?;
        Ok(self.tags())
    }

    async fn create_tag(&self, draft: &TagDraft) -> Result<Tag> {
        self.check_online()?;
        let mut inner = self.lock();
        let key = natural_key(&draft.name);
        inner.writes.push(RemoteCall::CreateTag {
            name: draft.name.clone(),
        });
        if inner.failing_tags.contains(&key) {
            return Err(Error::Remote(format!("rejected tag {}", draft.name)));
        }
        if let Some(existing) = inner.tags.iter().find(|tag| tag.key() == key) {
            return Ok(existing.clone());
        }
        let mut tag = Tag::new(&draft.name).with_color(draft.color.clone());
        tag.id = Some(TagId::new());
        inner.tags.push(tag.clone());
        Ok(tag)
    }

    async fn update_tag(&self, id: &TagId, patch: &TagPatch) -> Result<Tag> {
        self.check_online()?;
        let mut inner = self.lock();
        inner.writes.push(RemoteCall::UpdateTag { id: *id });
        let tag = inner
            .tags
            .iter_mut()
            .find(|tag| tag.id == Some(*id))
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if let Some(color) = &patch.color {
            tag.color.clone_from(color);
        }
        Ok(tag.clone())
    }

    async fn get_post_tag_associations(&self, post_id: &PostId) -> Result<Vec<Tag>> {
        self.check_online()?;
        Ok(self.lock().tags_of(post_id))
    }

    async fn get_all_post_tag_associations(&self) -> Result<Vec<AssociatedTag>> {
        self.check_online()?;
        let inner = self.lock();
        Ok(inner
            .links
            .iter()
            .filter_map(|(post_id, tag_id)| {
                inner
                    .tags
                    .iter()
                    .find(|tag| tag.id == Some(*tag_id))
                    .map(|tag| AssociatedTag {
                        post_id: *post_id,
                        tag: tag.clone(),
                    })
            })
            .collect())
    }

    async fn add_associations(&self, post_id: &PostId, tag_ids: &[TagId]) -> Result<bool> {
        self.check_online()?;
        let mut inner = self.lock();
        inner.writes.push(RemoteCall::AddAssociations {
            post_id: *post_id,
            tag_ids: tag_ids.to_vec(),
        });
        for tag_id in tag_ids {
            if !inner.links.contains(&(*post_id, *tag_id)) {
                inner.links.push((*post_id, *tag_id));
            }
        }
        Ok(true)
    }

    async fn remove_associations(&self, post_id: &PostId, tag_ids: &[TagId]) -> Result<bool> {
        self.check_online()?;
        let mut inner = self.lock();
        inner.writes.push(RemoteCall::RemoveAssociations {
            post_id: *post_id,
            tag_ids: tag_ids.to_vec(),
        });
        inner
            .links
            .retain(|(post, tag)| post != post_id || !tag_ids.contains(tag));
        Ok(true)
    }
}
