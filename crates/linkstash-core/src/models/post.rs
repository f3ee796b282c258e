//! Post model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

use super::tag::TagRef;
use super::timestamp;
use crate::util::natural_key;

/// A unique identifier for a post in the remote store, using UUID v7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(Uuid);

impl PostId {
    /// Create a new unique post ID using UUID v7
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

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Site a link points at, used to pick a preview renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    #[serde(alias = "x")]
    Twitter,
    Instagram,
    Tiktok,
    Reddit,
    Linkedin,
    Facebook,
    Spotify,
    Vimeo,
    Github,
    #[default]
    #[serde(other)]
    Generic,
}

impl Platform {
    /// Detect the platform from a URL's host
    pub fn detect(url: &str) -> Self {
        static HOST: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?i)[a-z][a-z0-9+.-]*://(?:[^@/]*@)?(?:www\.|m\.|mobile\.)?([^/:?#]+)")
                .expect("Invalid regex")
        });

        let Some(host) = HOST
            .captures(url.trim())
            .map(|cap| cap[1].to_ascii_lowercase())
        else {
            return Self::Generic;
        };

        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));
        if matches("youtube.com") || matches("youtu.be") {
            Self::Youtube
        } else if matches("twitter.com") || matches("x.com") {
            Self::Twitter
        } else if matches("instagram.com") {
            Self::Instagram
        } else if matches("tiktok.com") {
            Self::Tiktok
        } else if matches("reddit.com") || matches("redd.it") {
            Self::Reddit
        } else if matches("linkedin.com") {
            Self::Linkedin
        } else if matches("facebook.com") || matches("fb.watch") {
            Self::Facebook
        } else if matches("spotify.com") {
            Self::Spotify
        } else if matches("vimeo.com") {
            Self::Vimeo
        } else if matches("github.com") {
            Self::Github
        } else {
            Self::Generic
        }
    }

    /// Lowercase name as stored in both stores
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::Tiktok => "tiktok",
            Self::Reddit => "reddit",
            Self::Linkedin => "linkedin",
            Self::Facebook => "facebook",
            Self::Spotify => "spotify",
            Self::Vimeo => "vimeo",
            Self::Github => "github",
            Self::Generic => "generic",
        }
    }
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
            .unwrap_or_default())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A saved link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Remote identifier, `None` until the post has been written remotely
    #[serde(default)]
    pub id: Option<PostId>,
    /// The saved URL; unique per owner
    pub url: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    /// Creation timestamp (Unix ms)
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub created_at: Option<i64>,
    /// Last update timestamp (Unix ms)
    #[serde(default, deserialize_with = "timestamp::lenient")]
    pub updated_at: Option<i64>,
    /// Whether this local copy matches the remote store
    #[serde(default)]
    pub synced: bool,
}

impl Post {
    /// Create a new local post for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into().trim().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: None,
            platform: Platform::detect(&url),
            url,
            title: String::new(),
            description: String::new(),
            tags: Vec::new(),
            created_at: Some(now),
            updated_at: Some(now),
            synced: false,
        }
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the tag list
    #[must_use]
    pub fn with_tags<T: Into<TagRef>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Natural key used to match this post across stores
    pub fn key(&self) -> String {
        natural_key(&self.url)
    }

    /// Freshness used by the direction resolver: `updatedAt ?? createdAt`,
    /// epoch zero when neither is present.
    pub fn freshness(&self) -> i64 {
        self.updated_at.or(self.created_at).unwrap_or(0)
    }

    /// Whether the scalar fields differ from `other`
    pub fn scalars_differ(&self, other: &Self) -> bool {
        self.title != other.title
            || self.description != other.description
            || self.platform != other.platform
    }

    /// Draft used to create this post remotely
    pub fn to_draft(&self) -> PostDraft {
        PostDraft {
            url: self.url.clone(),
            platform: self.platform,
            title: self.title.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
        }
    }

    /// Patch carrying this post's scalar fields
    pub fn to_patch(&self) -> PostPatch {
        PostPatch {
            platform: Some(self.platform),
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
        }
    }
}

/// Fields needed to create a post remotely.
///
/// Carries no tags: associations are always written in a separate step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub url: String,
    pub platform: Platform,
    pub title: String,
    pub description: String,
    pub created_at: Option<i64>,
}

/// Partial post update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
