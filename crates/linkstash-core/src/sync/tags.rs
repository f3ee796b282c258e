//! Tag reconciliation against the remote tag collection.

use std::collections::HashMap;

use crate::error::Result;
use crate::models::{NormalizedTag, Tag, TagDraft, TagPatch, TagRef};
use crate::remote::RemoteStore;
use crate::util::natural_key;

/// Remote tags keyed by normalized name, kept current for the rest of a pass
#[derive(Debug, Clone, Default)]
pub struct TagMap {
    by_name: HashMap<String, Tag>,
}

impl TagMap {
    pub fn from_remote(tags: impl IntoIterator<Item = Tag>) -> Self {
        let mut map = Self::default();
        for tag in tags {
            map.insert(tag);
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.by_name.get(&natural_key(name))
    }

    pub fn insert(&mut self, tag: Tag) {
        self.by_name.insert(tag.key(), tag);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Every known tag, sorted by name
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.by_name.values().cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }
}

/// Writes performed by one [`reconcile_tags`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    pub created: usize,
    pub recolored: usize,
    pub failed: usize,
}

/// One wanted tag after merging every local mention of its name
struct WantedTag {
    tag: NormalizedTag,
    /// Whether some mention carried a color of its own
    explicit_color: bool,
}

fn collect_wanted(local: &[TagRef]) -> Vec<WantedTag> {
    let mut wanted: Vec<WantedTag> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tag_ref in local {
        let Some(tag) = tag_ref.normalize() else {
            continue;
        };
        let explicit = matches!(tag_ref, TagRef::Object { color: Some(color), .. } if !color.trim().is_empty());

        match index.get(&tag.name) {
            Some(&position) => {
                let existing = &mut wanted[position];
                if explicit && !existing.explicit_color {
                    existing.tag.color = tag.color;
                    existing.explicit_color = true;
                }
            }
            None => {
                index.insert(tag.name.clone(), wanted.len());
                wanted.push(WantedTag {
                    tag,
                    explicit_color: explicit,
                });
            }
        }
    }
    wanted
}

/// Bring the remote tag collection up to date with the local tags.
///
/// Creates every local tag missing remotely and pushes local colors onto
/// remote tags that differ. Only mentions that carry a color recolor a
/// remote tag; a bare name never resets a color. Tags are never removed.
/// A failure on one tag is logged and the rest carry on; only the initial
/// read fails the call.
pub async fn reconcile_tags<R: RemoteStore>(
    remote: &R,
    local: &[TagRef],
) -> Result<(TagMap, TagReport)> {
    let mut map = TagMap::from_remote(remote.get_tags().await?);
    let mut report = TagReport::default();

    for wanted in collect_wanted(local) {
        let Some(existing) = map.get(&wanted.tag.name).cloned() else {
            match remote.create_tag(&TagDraft::from(wanted.tag.clone())).await {
                Ok(created) => {
                    tracing::debug!("Created remote tag {}", created.name);
                    map.insert(created);
                    report.created += 1;
                }
                Err(error) => {
                    tracing::warn!("Failed to create tag {}: {}", wanted.tag.name, error);
                    report.failed += 1;
                }
            }
            continue;
        };

        if !wanted.explicit_color || existing.color == wanted.tag.color {
            continue;
        }
        let Some(id) = existing.id else {
            continue;
        };
        let patch = TagPatch {
            color: Some(wanted.tag.color.clone()),
        };
        match remote.update_tag(&id, &patch).await {
            Ok(updated) => {
                tracing::debug!("Recolored remote tag {} to {}", updated.name, updated.color);
                map.insert(updated);
                report.recolored += 1;
            }
            Err(error) => {
                tracing::warn!("Failed to recolor tag {}: {}", existing.name, error);
                report.failed += 1;
            }
        }
    }

    Ok((map, report))
}

/// Resolve a tag by name, creating it remotely if the map lacks it
pub async fn find_or_create_tag<R: RemoteStore>(
    remote: &R,
    map: &mut TagMap,
    tag: &NormalizedTag,
) -> Result<Tag> {
    if let Some(existing) = map.get(&tag.name) {
        return Ok(existing.clone());
    }
    let created = remote.create_tag(&TagDraft::from(tag.clone())).await?;
    map.insert(created.clone());
    Ok(created)
}

/// Merge canonical remote tags into the local tag list.
///
/// Remote records replace local ones with the same name; local-only tags
/// are kept.
pub fn merge_into_local(local: &[Tag], remote: &TagMap) -> Vec<Tag> {
    let mut merged = remote.tags();
    for tag in local {
        if remote.get(&tag.name).is_none() && !merged.iter().any(|t| t.key() == tag.key()) {
            merged.push(tag.clone());
        }
    }
    merged
}
