//! In-memory local store

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::LocalStore;
use crate::auth::Identity;
use crate::error::{Error, Result};
use crate::models::{Post, Tag};

#[derive(Debug, Default)]
struct Collections {
    posts: Vec<Post>,
    tags: Vec<Tag>,
}

/// Map-backed store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Collections>>> {
        self.inner
            .lock()
            .map_err(|error| Error::Database(format!("local store lock poisoned: {error}")))
    }
}

impl LocalStore for MemoryStore {
    fn load_posts(&self, identity: &Identity) -> Result<Vec<Post>> {
        Ok(self
            .lock()?
            .get(&identity.id)
            .map(|collections| collections.posts.clone())
            .unwrap_or_default())
    }

    fn save_posts(&self, identity: &Identity, posts: &[Post]) -> Result<()> {
        self.lock()?.entry(identity.id.clone()).or_default().posts = posts.to_vec();
        Ok(())
    }

    fn load_tags(&self, identity: &Identity) -> Result<Vec<Tag>> {
        Ok(self
            .lock()?
            .get(&identity.id)
            .map(|collections| collections.tags.clone())
            .unwrap_or_default())
    }

    fn save_tags(&self, identity: &Identity, tags: &[Tag]) -> Result<()> {
        self.lock()?.entry(identity.id.clone()).or_default().tags = tags.to_vec();
        Ok(())
    }
}
