//! Delta reconciliation of one post's tag associations.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{normalize_tags, PostId, TagId, TagRef};
use crate::remote::RemoteStore;
use crate::sync::tags::{find_or_create_tag, TagMap};

/// Names linked and unlinked by one [`sync_post_tags`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Desired tags that could not be resolved or linked
    pub unlinked: Vec<String>,
}

impl AssociationDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Whether the remote now carries every desired tag
    pub fn is_complete(&self) -> bool {
        self.unlinked.is_empty()
    }
}

/// Make the remote associations of `post_id` match `desired`.
///
/// Only the difference is written: tags missing remotely are linked (and
/// created first when unknown), tags no longer wanted are unlinked. An
/// empty `desired` clears the post. When nothing differs no write is made.
pub async fn sync_post_tags<R: RemoteStore>(
    remote: &R,
    post_id: &PostId,
    desired: &[TagRef],
    tags: &mut TagMap,
) -> Result<AssociationDelta> {
    let desired = normalize_tags(desired);
    let existing = remote.get_post_tag_associations(post_id).await?;

    let desired_names: HashSet<&str> = desired.iter().map(|tag| tag.name.as_str()).collect();
    let existing_names: HashSet<String> = existing.iter().map(|tag| tag.key()).collect();

    let to_add: Vec<_> = desired
        .iter()
        .filter(|tag| !existing_names.contains(&tag.name))
        .collect();
    let to_remove: Vec<_> = existing
        .iter()
        .filter(|tag| !desired_names.contains(tag.key().as_str()))
        .collect();

    let mut delta = AssociationDelta::default();
    if to_add.is_empty() && to_remove.is_empty() {
        return Ok(delta);
    }

    let mut add_ids: Vec<TagId> = Vec::with_capacity(to_add.len());
    for tag in to_add {
        match find_or_create_tag(remote, tags, tag).await {
            Ok(resolved) => match resolved.id {
                Some(id) => {
                    add_ids.push(id);
                    delta.added.push(resolved.name);
                }
                None => delta.unlinked.push(resolved.name),
            },
            Err(error) => {
                tracing::warn!("Skipping tag {} for post {}: {}", tag.name, post_id, error);
                delta.unlinked.push(tag.name.clone());
            }
        }
    }
    if !add_ids.is_empty() && !remote.add_associations(post_id, &add_ids).await? {
        tracing::warn!("Some tags could not be linked to post {post_id}");
        delta.unlinked.append(&mut delta.added);
    }

    let remove_ids: Vec<TagId> = to_remove.iter().filter_map(|tag| tag.id).collect();
    if !remove_ids.is_empty() {
        remote.remove_associations(post_id, &remove_ids).await?;
        delta.removed = to_remove.iter().map(|tag| tag.name.clone()).collect();
    }

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Post, Tag};
    use crate::sync::testing::{RecordingRemote, RemoteCall};
    use pretty_assertions::assert_eq;

    fn names(values: &[&str]) -> Vec<TagRef> {
        values.iter().map(|value| TagRef::from(*value)).collect()
    }

    async fn seeded(remote: &RecordingRemote, tags: &[&str]) -> PostId {
        let post = remote.seed_post(Post::new("https://example.com/p"));
        let id = post.id.unwrap();
        let mut map = TagMap::default();
        sync_post_tags(remote, &id, &names(tags), &mut map).await.unwrap();
        remote.clear_writes();
        id
    }

    #[tokio::test]
    async fn links_new_tags_in_one_call() {
        let remote = RecordingRemote::new();
        let id = seeded(&remote, &[]).await;
        let mut map = TagMap::default();

        let delta = sync_post_tags(&remote, &id, &names(&["a", "b"]), &mut map)
            .await
            .unwrap();

        assert_eq!(delta.added, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(remote.post_tag_names(&id), vec!["a", "b"]);
        let adds = remote
            .writes()
            .into_iter()
            .filter(|call| matches!(call, RemoteCall::AddAssociations { .. }))
            .count();
        assert_eq!(adds, 1);
    }

    #[tokio::test]
    async fn only_the_delta_is_written() {
        let remote = RecordingRemote::new();
        let id = seeded(&remote, &["a", "b"]).await;
        let mut map = TagMap::from_remote(remote.tags());

        let delta = sync_post_tags(&remote, &id, &names(&["b", "c"]), &mut map)
            .await
            .unwrap();

        assert_eq!(delta.added, vec!["c".to_string()]);
        assert_eq!(delta.removed, vec!["a".to_string()]);
        assert_eq!(remote.post_tag_names(&id), vec!["b", "c"]);

        let writes = remote.writes();
        let adds = writes
            .iter()
            .filter(|call| matches!(call, RemoteCall::AddAssociations { .. }))
            .count();
        let removes = writes
            .iter()
            .filter(|call| matches!(call, RemoteCall::RemoveAssociations { .. }))
            .count();
        assert_eq!((adds, removes), (1, 1));
    }

    #[tokio::test]
    async fn unchanged_tags_write_nothing() {
        let remote = RecordingRemote::new();
        let id = seeded(&remote, &["a", "b"]).await;
        let mut map = TagMap::from_remote(remote.tags());

        let delta = sync_post_tags(&remote, &id, &names(&["B", " a "]), &mut map)
            .await
            .unwrap();

        assert!(delta.is_empty());
        assert!(remote.writes().is_empty());
    }

    #[tokio::test]
    async fn empty_desired_list_clears_the_post() {
        let remote = RecordingRemote::new();
        let id = seeded(&remote, &["a", "b"]).await;
        let mut map = TagMap::from_remote(remote.tags());

        let delta = sync_post_tags(&remote, &id, &[], &mut map).await.unwrap();

        assert_eq!(delta.removed.len(), 2);
        assert!(remote.post_tag_names(&id).is_empty());
        // the tags themselves survive
        assert_eq!(remote.tags().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_names_collapse_before_linking() {
        let remote = RecordingRemote::new();
        let id = seeded(&remote, &[]).await;
        let mut map = TagMap::default();

        sync_post_tags(&remote, &id, &names(&["N", "n ", "n"]), &mut map)
            .await
            .unwrap();

        assert_eq!(remote.post_tag_names(&id), vec!["n"]);
        assert_eq!(remote.tags().len(), 1);
    }

    #[tokio::test]
    async fn rejected_tags_are_reported_as_unlinked() {
        let remote = RecordingRemote::new();
        remote.fail_tag("bad");
        let id = seeded(&remote, &[]).await;
        let mut map = TagMap::default();

        let delta = sync_post_tags(&remote, &id, &names(&["good", "Bad"]), &mut map)
            .await
            .unwrap();

        assert_eq!(delta.added, vec!["good".to_string()]);
        assert_eq!(delta.unlinked, vec!["bad".to_string()]);
        assert!(!delta.is_complete());
        assert_eq!(remote.post_tag_names(&id), vec!["good"]);
    }

    #[tokio::test]
    async fn existing_remote_tags_are_reused() {
        let remote = RecordingRemote::new();
        let known = remote.seed_tag(Tag::new("rust"));
        let id = seeded(&remote, &[]).await;
        let mut map = TagMap::from_remote(remote.tags());

        sync_post_tags(&remote, &id, &names(&["rust"]), &mut map)
            .await
            .unwrap();

        assert_eq!(remote.tags(), vec![known]);
        assert!(!remote
            .writes()
            .iter()
            .any(|call| matches!(call, RemoteCall::CreateTag { .. })));
    }
}
