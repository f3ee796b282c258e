//! Post reconciliation in both directions.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::models::{Post, PostId, TagRef};
use crate::remote::RemoteStore;
use crate::sync::associations::sync_post_tags;
use crate::sync::tags::TagMap;

/// Outcome of pushing local posts to the remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub created: usize,
    pub updated: usize,
    /// Posts whose tag links changed
    pub relinked: usize,
    pub failed: usize,
}

/// Outcome of pulling remote posts into the local cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub added: usize,
    pub updated: usize,
    pub total: usize,
}

/// Collapse posts sharing a URL, keeping the freshest copy in the position
/// of the first occurrence
pub fn dedupe_posts(posts: Vec<Post>) -> Vec<Post> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Post> = Vec::with_capacity(posts.len());
    for post in posts {
        match index.get(&post.key()) {
            Some(&position) => {
                if post.freshness() > unique[position].freshness() {
                    unique[position] = post;
                }
            }
            None => {
                index.insert(post.key(), unique.len());
                unique.push(post);
            }
        }
    }
    unique
}

/// Push local posts to the remote, local as the source of truth.
///
/// Existing posts get their scalars updated when they differ; missing posts
/// are created and then linked in a second step. Associations are always
/// reconciled. A failure on one post is logged and the rest carry on.
///
/// Returns the local posts with remote ids stamped; posts that went through
/// cleanly are marked synced.
pub async fn push_posts<R: RemoteStore>(
    remote: &R,
    local: Vec<Post>,
    remote_posts: &[Post],
    tags: &mut TagMap,
) -> (Vec<Post>, PushSummary) {
    let mut by_key: HashMap<String, PostId> = remote_posts
        .iter()
        .filter_map(|post| post.id.map(|id| (post.key(), id)))
        .collect();
    let remote_by_id: HashMap<PostId, &Post> = remote_posts
        .iter()
        .filter_map(|post| post.id.map(|id| (id, post)))
        .collect();

    let mut summary = PushSummary::default();
    let mut pushed = Vec::with_capacity(local.len());

    for mut post in local {
        let mut clean = true;

        let id = if let Some(&id) = by_key.get(&post.key()) {
            let changed = remote_by_id
                .get(&id)
                .is_none_or(|existing| post.scalars_differ(existing));
            if changed {
                match remote.update_post(&id, &post.to_patch()).await {
                    Ok(_) => summary.updated += 1,
                    Err(error) => {
                        tracing::warn!("Failed to update post {}: {}", post.url, error);
                        clean = false;
                    }
                }
            }
            id
        } else {
            match remote.create_post(&post.to_draft()).await {
                Ok(Post { id: Some(id), .. }) => {
                    summary.created += 1;
                    by_key.insert(post.key(), id);
                    id
                }
                Ok(_) => {
                    tracing::warn!("Remote returned post {} without an id", post.url);
                    summary.failed += 1;
                    pushed.push(post);
                    continue;
                }
                Err(error) => {
                    tracing::warn!("Failed to create post {}: {}", post.url, error);
                    summary.failed += 1;
                    pushed.push(post);
                    continue;
                }
            }
        };

        post.id = Some(id);
        match sync_post_tags(remote, &id, &post.tags, tags).await {
            Ok(delta) => {
                if !delta.is_empty() {
                    summary.relinked += 1;
                }
                if !delta.is_complete() {
                    tracing::warn!(
                        "Tags left unlinked for post {}: {}",
                        post.url,
                        delta.unlinked.join(", ")
                    );
                    clean = false;
                }
            }
            Err(error) => {
                tracing::warn!("Failed to sync tags for post {}: {}", post.url, error);
                clean = false;
            }
        }

        if clean {
            post.synced = true;
            post.tags = canonical_tags(&post.tags, tags);
        } else {
            summary.failed += 1;
        }
        pushed.push(post);
    }

    tracing::info!(
        "Pushed posts: {} created, {} updated, {} relinked, {} failed",
        summary.created,
        summary.updated,
        summary.relinked,
        summary.failed
    );
    (pushed, summary)
}

/// Replace a post's tag mentions with the canonical remote records
fn canonical_tags(tags: &[TagRef], map: &TagMap) -> Vec<TagRef> {
    crate::models::normalize_tags(tags)
        .into_iter()
        .map(|tag| match map.get(&tag.name) {
            Some(known) => TagRef::from(known),
            None => TagRef::Object {
                name: tag.name,
                color: Some(tag.color),
                id: None,
            },
        })
        .collect()
}

/// Pull remote posts into the local list, remote as the source of truth.
///
/// Posts only the remote has are appended; posts on both sides take the
/// remote scalars, timestamps and id. Every pulled post's tags are replaced
/// by its remote association rows. Local-only posts are kept.
pub async fn pull_posts<R: RemoteStore>(
    remote: &R,
    local: Vec<Post>,
    remote_posts: Vec<Post>,
) -> Result<(Vec<Post>, PullSummary)> {
    let mut tags_by_post: HashMap<PostId, Vec<TagRef>> = HashMap::new();
    for row in remote.get_all_post_tag_associations().await? {
        tags_by_post
            .entry(row.post_id)
            .or_default()
            .push(TagRef::from(&row.tag));
    }

    let mut merged = dedupe_posts(local);
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(position, post)| (post.key(), position))
        .collect();
    let mut summary = PullSummary::default();

    for mut incoming in remote_posts {
        if let Some(id) = incoming.id {
            incoming.tags = tags_by_post.remove(&id).unwrap_or_default();
        }
        incoming.synced = true;

        match index.get(&incoming.key()) {
            Some(&position) => {
                let existing = &mut merged[position];
                if *existing != incoming {
                    existing.id = incoming.id;
                    existing.platform = incoming.platform;
                    existing.title = incoming.title;
                    existing.description = incoming.description;
                    existing.tags = incoming.tags;
                    existing.created_at = incoming.created_at;
                    existing.updated_at = incoming.updated_at;
                    existing.synced = true;
                    summary.updated += 1;
                }
            }
            None => {
                index.insert(incoming.key(), merged.len());
                merged.push(incoming);
                summary.added += 1;
            }
        }
    }

    summary.total = merged.len();
    tracing::info!(
        "Pulled posts: {} added, {} updated, {} total",
        summary.added,
        summary.updated,
        summary.total
    );
    Ok((merged, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;
    use crate::sync::testing::{RecordingRemote, RemoteCall};
    use pretty_assertions::assert_eq;

    async fn push(remote: &RecordingRemote, local: Vec<Post>) -> (Vec<Post>, PushSummary) {
        let remote_posts = remote.get_posts().await.unwrap();
        let mut map = TagMap::from_remote(remote.get_tags().await.unwrap());
        push_posts(remote, local, &remote_posts, &mut map).await
    }

    #[tokio::test]
    async fn new_post_is_created_then_linked() {
        let remote = RecordingRemote::new();
        let local = vec![Post::new("https://x.com/1").with_tags(["a", "b"])];

        let (pushed, summary) = push(&remote, local).await;

        assert_eq!(summary.created, 1);
        assert_eq!(summary.relinked, 1);
        assert!(pushed[0].synced);
        let id = pushed[0].id.unwrap();
        assert_eq!(remote.post_tag_names(&id), vec!["a", "b"]);

        let writes = remote.writes();
        assert!(matches!(writes[0], RemoteCall::CreatePost { .. }));
        assert!(writes
            .iter()
            .any(|call| matches!(call, RemoteCall::AddAssociations { .. })));
    }

    #[tokio::test]
    async fn changed_scalars_are_updated() {
        let remote = RecordingRemote::new();
        remote.seed_post(Post::new("https://a.dev").with_title("old"));

        let local = vec![Post::new("https://a.dev").with_title("new")];
        let (_, summary) = push(&remote, local).await;

        assert_eq!(summary.updated, 1);
        assert_eq!(remote.posts()[0].title, "new");
    }

    #[tokio::test]
    async fn identical_scalars_skip_the_update() {
        let remote = RecordingRemote::new();
        remote.seed_post(Post::new("https://a.dev").with_title("same"));

        let (_, summary) = push(&remote, vec![Post::new("https://a.dev").with_title("same")]).await;

        assert_eq!(summary, PushSummary::default());
        assert!(remote.writes().is_empty());
    }

    #[tokio::test]
    async fn existing_post_still_gets_its_tags_reconciled() {
        let remote = RecordingRemote::new();
        let seeded = remote.seed_post(Post::new("https://a.dev"));

        let local = vec![Post::new("https://a.dev").with_tags(["rust"])];
        let (_, summary) = push(&remote, local).await;

        assert_eq!(summary.updated, 0);
        assert_eq!(summary.relinked, 1);
        assert_eq!(remote.post_tag_names(&seeded.id.unwrap()), vec!["rust"]);
    }

    #[tokio::test]
    async fn second_push_writes_nothing() {
        let remote = RecordingRemote::new();
        let local = vec![
            Post::new("https://a.dev").with_tags(["x", "y"]),
            Post::new("https://b.dev").with_title("b").with_tags(["y"]),
        ];

        let (pushed, _) = push(&remote, local).await;
        remote.clear_writes();
        let (_, summary) = push(&remote, pushed).await;

        assert_eq!(summary, PushSummary::default());
        assert!(remote.writes().is_empty());
    }

    #[tokio::test]
    async fn one_failing_post_does_not_stop_the_others() {
        let remote = RecordingRemote::new();
        remote.fail_post("https://bad.dev");

        let local = vec![Post::new("https://bad.dev"), Post::new("https://good.dev")];
        let (pushed, summary) = push(&remote, local).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
        assert!(!pushed[0].synced);
        assert!(pushed[1].synced);
        assert_eq!(remote.posts().len(), 1);
    }

    #[tokio::test]
    async fn rejected_tag_leaves_the_post_unsynced() {
        let remote = RecordingRemote::new();
        remote.fail_tag("bad");

        let local = vec![Post::new("https://a.dev").with_tags(["good", "bad"])];
        let (pushed, summary) = push(&remote, local).await;

        assert!(!pushed[0].synced);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(remote.post_tag_names(&pushed[0].id.unwrap()), vec!["good"]);
    }

    #[tokio::test]
    async fn duplicate_urls_create_a_single_remote_post() {
        let remote = RecordingRemote::new();
        let local = vec![Post::new("https://a.dev"), Post::new("HTTPS://A.DEV")];

        push(&remote, local).await;

        assert_eq!(remote.posts().len(), 1);
    }

    #[tokio::test]
    async fn pull_appends_missing_and_overwrites_shared_posts() {
        let remote = RecordingRemote::new();
        let shared = remote.seed_post(Post::new("https://shared.dev").with_title("remote"));
        let only_remote = remote.seed_post(Post::new("https://remote.dev"));
        remote.link(&shared.id.unwrap(), remote.seed_tag(Tag::new("rust")));

        let local = vec![
            Post::new("https://shared.dev").with_title("local").with_tags(["stale"]),
            Post::new("https://local.dev"),
        ];
        let remote_posts = remote.get_posts().await.unwrap();
        let (merged, summary) = pull_posts(&remote, local, remote_posts).await.unwrap();

        assert_eq!(summary, PullSummary { added: 1, updated: 1, total: 3 });
        assert_eq!(merged[0].title, "remote");
        assert_eq!(merged[0].id, shared.id);
        assert_eq!(merged[0].tags.len(), 1);
        assert_eq!(merged[0].tags[0].raw_name(), "rust");
        assert!(merged[0].synced);
        assert_eq!(merged[1].url, "https://local.dev");
        assert!(!merged[1].synced);
        assert_eq!(merged[2].id, only_remote.id);
        assert!(merged[2].synced);
        assert!(remote.writes().is_empty());
    }

    #[tokio::test]
    async fn pull_is_stable_on_repeat() {
        let remote = RecordingRemote::new();
        remote.seed_post(Post::new("https://a.dev").with_title("a"));

        let remote_posts = remote.get_posts().await.unwrap();
        let (first, _) = pull_posts(&remote, Vec::new(), remote_posts.clone())
            .await
            .unwrap();
        let (second, summary) = pull_posts(&remote, first.clone(), remote_posts)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(summary.added + summary.updated, 0);
    }

    #[test]
    fn dedupe_keeps_freshest_copy_in_first_position() {
        let mut old = Post::new("https://a.dev").with_title("old");
        old.updated_at = Some(1);
        let mut new = Post::new("https://A.dev").with_title("new");
        new.updated_at = Some(2);
        let other = Post::new("https://b.dev");

        let unique = dedupe_posts(vec![old, other.clone(), new.clone()]);

        assert_eq!(unique, vec![new, other]);
    }
}
