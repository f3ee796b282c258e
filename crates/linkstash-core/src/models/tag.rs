//! Tag model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::natural_key;

/// Color given to tags that arrive without one.
pub const DEFAULT_TAG_COLOR: &str = "#3b82f6";

/// A unique identifier for a tag in the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagId(Uuid);

impl TagId {
    /// Create a new unique tag ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TagId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A tag for organizing saved links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Remote identifier, `None` until the tag exists remotely
    #[serde(default)]
    pub id: Option<TagId>,
    /// Tag name (stored in lowercase)
    pub name: String,
    /// Display color, e.g. `#3b82f6`
    #[serde(default = "default_color")]
    pub color: String,
}

impl Tag {
    /// Create a local tag with the given name and the default color
    ///
    /// The name is automatically trimmed and converted to lowercase.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: None,
            name: natural_key(name.as_ref()),
            color: DEFAULT_TAG_COLOR.to_string(),
        }
    }

    /// Set the color
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Natural key used to match this tag across stores
    pub fn key(&self) -> String {
        natural_key(&self.name)
    }
}

/// A tag as it appears on a post: either a bare name or a full object.
///
/// Older caches stored plain strings; newer ones store objects. Both are
/// accepted and normalized with [`TagRef::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    /// Bare tag name
    Name(String),
    /// Tag object with optional color and remote id
    Object {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<TagId>,
    },
}

impl TagRef {
    /// Raw name as written, before normalization
    pub fn raw_name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Object { name, .. } => name,
        }
    }

    /// Canonical `{name, color}` record, or `None` for a blank name
    pub fn normalize(&self) -> Option<NormalizedTag> {
        let name = natural_key(self.raw_name());
        if name.is_empty() {
            return None;
        }
        let color = match self {
            Self::Object {
                color: Some(color), ..
            } if !color.trim().is_empty() => color.trim().to_string(),
            _ => DEFAULT_TAG_COLOR.to_string(),
        };
        Some(NormalizedTag { name, color })
    }
}

impl From<&Tag> for TagRef {
    fn from(tag: &Tag) -> Self {
        Self::Object {
            name: tag.name.clone(),
            color: Some(tag.color.clone()),
            id: tag.id,
        }
    }
}

impl From<&str> for TagRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// The single internal tag record every representation normalizes into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedTag {
    /// Lower-cased, trimmed name
    pub name: String,
    /// Color, defaulted when absent
    pub color: String,
}

impl From<NormalizedTag> for TagDraft {
    fn from(tag: NormalizedTag) -> Self {
        Self {
            name: tag.name,
            color: tag.color,
        }
    }
}

/// Normalize a tag list, keeping the first occurrence of each name.
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a TagRef>) -> Vec<NormalizedTag> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter_map(TagRef::normalize)
        .filter(|tag| seen.insert(tag.name.clone()))
        .collect()
}

/// Fields needed to create a tag remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDraft {
    pub name: String,
    pub color: String,
}

/// Partial tag update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new_lowercase() {
        let tag = Tag::new(" Hello ");
        assert_eq!(tag.name, "hello");
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_tag_id_unique() {
        let id1 = TagId::new();
        let id2 = TagId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn tag_ref_accepts_string_and_object() {
        let refs: Vec<TagRef> =
            serde_json::from_str(r##"["rust", {"name": "News", "color": "#222"}]"##).unwrap();
        assert_eq!(refs[0], TagRef::Name("rust".to_string()));
        let normalized = refs[1].normalize().unwrap();
        assert_eq!(normalized.name, "news");
        assert_eq!(normalized.color, "#222");
    }

    #[test]
    fn normalize_defaults_color_and_rejects_blank() {
        assert_eq!(
            TagRef::from("Rust").normalize(),
            Some(NormalizedTag {
                name: "rust".to_string(),
                color: DEFAULT_TAG_COLOR.to_string(),
            })
        );
        assert_eq!(TagRef::from("   ").normalize(), None);
    }

    #[test]
    fn normalize_tags_deduplicates_by_name() {
        let refs = [TagRef::from("a"), TagRef::from("A "), TagRef::from("b")];
        let names: Vec<_> = normalize_tags(&refs).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
