//! libSQL implementation of the remote store

use std::collections::HashMap;
use std::sync::Arc;

use libsql::Row;

use super::RemoteStore;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    AssociatedTag, Platform, Post, PostDraft, PostId, PostPatch, Tag, TagDraft, TagId, TagPatch,
    TagRef,
};
use crate::util::{natural_key, unix_timestamp_ms_now};

const POST_COLUMNS: &str = "id, url, platform, title, description, created_at, updated_at";

/// Remote store over a libSQL database, scoped to one owner
#[derive(Clone)]
pub struct LibSqlRemoteStore {
    db: Arc<Database>,
    owner_id: String,
}

impl LibSqlRemoteStore {
    /// Create a store for `owner_id` over an opened database
    pub fn new(db: Arc<Database>, owner_id: impl Into<String>) -> Self {
        Self {
            db,
            owner_id: owner_id.into(),
        }
    }

    /// Owner every query is scoped to
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    async fn post_by_url(&self, url: &str) -> Result<Post> {
        let mut rows = self
            .db
            .connection()
            .query(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE owner_id = ? AND url = ?"),
                [self.owner_id.as_str(), url],
            )
            .await?;
        match rows.next().await? {
            Some(row) => parse_post(&row),
            None => Err(Error::NotFound(url.to_string())),
        }
    }

    async fn post_by_id(&self, id: &PostId) -> Result<Post> {
        let mut rows = self
            .db
            .connection()
            .query(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE owner_id = ? AND id = ?"),
                [self.owner_id.clone(), id.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => parse_post(&row),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn tag_by_name(&self, name: &str) -> Result<Tag> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT id, name, color FROM tags WHERE owner_id = ? AND name = ? COLLATE NOCASE",
                [self.owner_id.as_str(), name],
            )
            .await?;
        match rows.next().await? {
            Some(row) => parse_tag(&row, 0),
            None => Err(Error::NotFound(name.to_string())),
        }
    }

    async fn tag_by_id(&self, id: &TagId) -> Result<Tag> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT id, name, color FROM tags WHERE owner_id = ? AND id = ?",
                [self.owner_id.clone(), id.as_str()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => parse_tag(&row, 0),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    async fn association_exists(&self, post_id: &PostId, tag_id: &TagId) -> Result<bool> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT 1 FROM post_tags WHERE post_id = ? AND tag_id = ?",
                [post_id.as_str(), tag_id.as_str()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }
}

impl RemoteStore for LibSqlRemoteStore {
    async fn get_posts(&self) -> Result<Vec<Post>> {
        let mut rows = self
            .db
            .connection()
            .query(
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts WHERE owner_id = ? ORDER BY created_at DESC"
                ),
                [self.owner_id.as_str()],
            )
            .await?;

        let mut posts = Vec::new();
        while let Some(row) = rows.next().await? {
            posts.push(parse_post(&row)?);
        }

        let mut tags_by_post: HashMap<PostId, Vec<TagRef>> = HashMap::new();
        for association in self.get_all_post_tag_associations().await? {
            tags_by_post
                .entry(association.post_id)
                .or_default()
                .push(TagRef::from(&association.tag));
        }
        for post in &mut posts {
            if let Some(id) = post.id {
                post.tags = tags_by_post.remove(&id).unwrap_or_default();
            }
        }

        Ok(posts)
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<Post> {
        let url = draft.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("Post URL cannot be empty".into()));
        }

        let id = PostId::new();
        let now = unix_timestamp_ms_now();
        let affected = self
            .db
            .connection()
            .execute(
                "INSERT INTO posts (id, owner_id, url, platform, title, description, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (owner_id, url) DO NOTHING",
                (
                    id.as_str(),
                    self.owner_id.as_str(),
                    url,
                    draft.platform.as_str(),
                    draft.title.as_str(),
                    draft.description.as_str(),
                    draft.created_at.unwrap_or(now),
                    now,
                ),
            )
            .await?;

        if affected == 0 {
            tracing::debug!("Post {} already exists remotely; returning existing row", url);
        }
        self.post_by_url(url).await
    }

    async fn update_post(&self, id: &PostId, patch: &PostPatch) -> Result<Post> {
        let rows = self
            .db
            .connection()
            .execute(
                "UPDATE posts
                 SET platform = COALESCE(?, platform),
                     title = COALESCE(?, title),
                     description = COALESCE(?, description),
                     updated_at = ?
                 WHERE id = ? AND owner_id = ?",
                (
                    patch.platform.map(|platform| platform.as_str().to_string()),
                    patch.title.clone(),
                    patch.description.clone(),
                    unix_timestamp_ms_now(),
                    id.as_str(),
                    self.owner_id.as_str(),
                ),
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        let mut post = self.post_by_id(id).await?;
        post.tags = self
            .get_post_tag_associations(id)
            .await?
            .iter()
            .map(TagRef::from)
            .collect();
        Ok(post)
    }

    async fn get_tags(&self) -> Result<Vec<Tag>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT id, name, color FROM tags WHERE owner_id = ? ORDER BY name ASC",
                [self.owner_id.as_str()],
            )
            .await?;

        let mut tags = Vec::new();
        while let Some(row) = rows.next().await? {
            tags.push(parse_tag(&row, 0)?);
        }
        Ok(tags)
    }

    async fn create_tag(&self, draft: &TagDraft) -> Result<Tag> {
        let name = natural_key(&draft.name);
        if name.is_empty() {
            return Err(Error::InvalidInput("Tag name cannot be empty".into()));
        }

        self.db
            .connection()
            .execute(
                "INSERT INTO tags (id, owner_id, name, color, created_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (owner_id, name) DO NOTHING",
                (
                    TagId::new().as_str(),
                    self.owner_id.as_str(),
                    name.as_str(),
                    draft.color.as_str(),
                    unix_timestamp_ms_now(),
                ),
            )
            .await?;

        self.tag_by_name(&name).await
    }

    async fn update_tag(&self, id: &TagId, patch: &TagPatch) -> Result<Tag> {
        let rows = self
            .db
            .connection()
            .execute(
                "UPDATE tags SET color = COALESCE(?, color) WHERE id = ? AND owner_id = ?",
                (patch.color.clone(), id.as_str(), self.owner_id.as_str()),
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.tag_by_id(id).await
    }

    async fn get_post_tag_associations(&self, post_id: &PostId) -> Result<Vec<Tag>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT t.id, t.name, t.color
                 FROM post_tags pt
                 JOIN tags t ON pt.tag_id = t.id
                 JOIN posts p ON pt.post_id = p.id
                 WHERE pt.post_id = ? AND p.owner_id = ?
                 ORDER BY t.name ASC",
                [post_id.as_str(), self.owner_id.clone()],
            )
            .await?;

        let mut tags = Vec::new();
        while let Some(row) = rows.next().await? {
            tags.push(parse_tag(&row, 0)?);
        }
        Ok(tags)
    }

    async fn get_all_post_tag_associations(&self) -> Result<Vec<AssociatedTag>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT pt.post_id, t.id, t.name, t.color
                 FROM post_tags pt
                 JOIN tags t ON pt.tag_id = t.id
                 JOIN posts p ON pt.post_id = p.id
                 WHERE p.owner_id = ?
                 ORDER BY t.name ASC",
                [self.owner_id.as_str()],
            )
            .await?;

        let mut associations = Vec::new();
        while let Some(row) = rows.next().await? {
            let post_id: String = row.get(0)?;
            associations.push(AssociatedTag {
                post_id: parse_id(&post_id)?,
                tag: parse_tag(&row, 1)?,
            });
        }
        Ok(associations)
    }

    async fn add_associations(&self, post_id: &PostId, tag_ids: &[TagId]) -> Result<bool> {
        let mut linked_all = true;
        for tag_id in tag_ids {
            // Only link a post and tag that belong to the same owner
            let affected = self
                .db
                .connection()
                .execute(
                    "INSERT OR IGNORE INTO post_tags (post_id, tag_id)
                     SELECT p.id, t.id FROM posts p, tags t
                     WHERE p.id = ? AND t.id = ? AND p.owner_id = ? AND t.owner_id = ?",
                    [
                        post_id.as_str(),
                        tag_id.as_str(),
                        self.owner_id.clone(),
                        self.owner_id.clone(),
                    ],
                )
                .await?;

            if affected == 0 && !self.association_exists(post_id, tag_id).await? {
                tracing::warn!(
                    "Could not link tag {} to post {} for owner {}",
                    tag_id,
                    post_id,
                    self.owner_id
                );
                linked_all = false;
            }
        }
        Ok(linked_all)
    }

    async fn remove_associations(&self, post_id: &PostId, tag_ids: &[TagId]) -> Result<bool> {
        for tag_id in tag_ids {
            self.db
                .connection()
                .execute(
                    "DELETE FROM post_tags
                     WHERE post_id = ? AND tag_id = ?
                       AND post_id IN (SELECT id FROM posts WHERE owner_id = ?)",
                    [post_id.as_str(), tag_id.as_str(), self.owner_id.clone()],
                )
                .await?;
        }
        Ok(true)
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Database(format!("Invalid id in remote row: {raw}")))
}

fn parse_post(row: &Row) -> Result<Post> {
    let id: String = row.get(0)?;
    let platform: String = row.get(2)?;
    Ok(Post {
        id: Some(parse_id(&id)?),
        url: row.get(1)?,
        platform: platform.parse().unwrap_or(Platform::Generic),
        title: row.get(3)?,
        description: row.get(4)?,
        tags: Vec::new(),
        created_at: Some(row.get(5)?),
        updated_at: Some(row.get(6)?),
        synced: true,
    })
}

fn parse_tag(row: &Row, offset: i32) -> Result<Tag> {
    let id: String = row.get(offset)?;
    Ok(Tag {
        id: Some(parse_id(&id)?),
        name: row.get(offset + 1)?,
        color: row.get(offset + 2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_TAG_COLOR;
    use pretty_assertions::assert_eq;

    async fn setup(owner: &str) -> LibSqlRemoteStore {
        let db = Database::open_in_memory().await.unwrap();
        LibSqlRemoteStore::new(Arc::new(db), owner)
    }

    fn draft(url: &str) -> PostDraft {
        PostDraft {
            url: url.to_string(),
            platform: Platform::detect(url),
            title: "Title".to_string(),
            description: String::new(),
            created_at: Some(1_000),
        }
    }

    fn tag_draft(name: &str) -> TagDraft {
        TagDraft {
            name: name.to_string(),
            color: DEFAULT_TAG_COLOR.to_string(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_post_is_idempotent_per_url() {
        let store = setup("alice").await;

        let first = store.create_post(&draft("https://x.com/1")).await.unwrap();
        let second = store.create_post(&draft("https://x.com/1")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, Some(1_000));
        assert_eq!(first.platform, Platform::Twitter);
        assert_eq!(store.get_posts().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_post_matches_urls_case_insensitively() {
        let store = setup("alice").await;

        let first = store.create_post(&draft("https://A.dev/Path")).await.unwrap();
        let second = store.create_post(&draft("https://a.dev/path")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.url, "https://A.dev/Path");
        assert_eq!(store.get_posts().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_post_applies_only_given_fields() {
        let store = setup("alice").await;
        let post = store.create_post(&draft("https://a.dev")).await.unwrap();

        let patch = PostPatch {
            description: Some("notes".to_string()),
            ..PostPatch::default()
        };
        let updated = store.update_post(&post.id.unwrap(), &patch).await.unwrap();
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.description, "notes");

        let missing = store.update_post(&PostId::new(), &patch).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_tag_upserts_case_insensitively() {
        let store = setup("alice").await;

        let first = store.create_tag(&tag_draft("News")).await.unwrap();
        let second = store.create_tag(&tag_draft(" news ")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.name, "news");
        assert_eq!(store.get_tags().await.unwrap().len(), 1);

        let recolored = store
            .update_tag(
                &first.id.unwrap(),
                &TagPatch {
                    color: Some("#222".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(recolored.color, "#222");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn associations_add_remove_and_resolve() {
        let store = setup("alice").await;
        let post = store.create_post(&draft("https://a.dev")).await.unwrap();
        let post_id = post.id.unwrap();
        let a = store.create_tag(&tag_draft("a")).await.unwrap();
        let b = store.create_tag(&tag_draft("b")).await.unwrap();
        let ids = [a.id.unwrap(), b.id.unwrap()];

        assert!(store.add_associations(&post_id, &ids).await.unwrap());
        // Re-adding is harmless
        assert!(store.add_associations(&post_id, &ids).await.unwrap());

        let names: Vec<_> = store
            .get_post_tag_associations(&post_id)
            .await
            .unwrap()
            .into_iter()
            .map(|tag| tag.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        store
            .remove_associations(&post_id, &[a.id.unwrap()])
            .await
            .unwrap();
        let all = store.get_all_post_tag_associations().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tag.name, "b");

        let posts = store.get_posts().await.unwrap();
        assert_eq!(posts[0].tags, vec![TagRef::from(&b)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn owners_are_isolated() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let alice = LibSqlRemoteStore::new(db.clone(), "alice");
        let bob = LibSqlRemoteStore::new(db, "bob");

        let post = alice.create_post(&draft("https://a.dev")).await.unwrap();
        let bobs_tag = bob.create_tag(&tag_draft("a")).await.unwrap();

        assert!(bob.get_posts().await.unwrap().is_empty());
        // Same URL is a different post for another owner
        let bobs_post = bob.create_post(&draft("https://a.dev")).await.unwrap();
        assert_ne!(bobs_post.id, post.id);

        // Cross-owner links are refused
        let linked = alice
            .add_associations(&post.id.unwrap(), &[bobs_tag.id.unwrap()])
            .await
            .unwrap();
        assert!(!linked);
        assert!(alice.get_all_post_tag_associations().await.unwrap().is_empty());
    }
}
