//! JSON-file local store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::LocalStore;
use crate::auth::Identity;
use crate::error::Result;
use crate::models::{Post, Tag};

const POSTS_FILE: &str = "posts.json";
const TAGS_FILE: &str = "tags.json";

/// Stores each identity's collections as `<root>/<identity>/{posts,tags}.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one identity's cache
    pub fn identity_dir(&self, identity: &Identity) -> PathBuf {
        let safe: String = identity
            .id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(if safe.is_empty() { "_".to_string() } else { safe })
    }

    fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(error) => {
                tracing::warn!(
                    "Local cache {} is unreadable ({}); resetting to empty",
                    path.display(),
                    error
                );
                Self::quarantine_corrupted_file(path)?;
                Ok(Vec::new())
            }
        }
    }

    fn save_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Move an unreadable cache file aside so the next save starts clean
    fn quarantine_corrupted_file(path: &Path) -> Result<()> {
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        let backup_path = path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));
        std::fs::rename(path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted cache file from {} to {}",
            path.display(),
            backup_path.display()
        );
        Ok(())
    }
}

impl LocalStore for JsonFileStore {
    fn load_posts(&self, identity: &Identity) -> Result<Vec<Post>> {
        Self::load_collection(&self.identity_dir(identity).join(POSTS_FILE))
    }

    fn save_posts(&self, identity: &Identity, posts: &[Post]) -> Result<()> {
        Self::save_collection(&self.identity_dir(identity).join(POSTS_FILE), posts)
    }

    fn load_tags(&self, identity: &Identity) -> Result<Vec<Tag>> {
        Self::load_collection(&self.identity_dir(identity).join(TAGS_FILE))
    }

    fn save_tags(&self, identity: &Identity, tags: &[Tag]) -> Result<()> {
        Self::save_collection(&self.identity_dir(identity).join(TAGS_FILE), tags)
    }
}
