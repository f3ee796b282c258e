//! Data models for linkstash

mod association;
mod post;
mod tag;
pub mod timestamp;

pub use association::AssociatedTag;
pub use post::{Platform, Post, PostDraft, PostId, PostPatch};
pub use tag::{
    normalize_tags, NormalizedTag, Tag, TagDraft, TagId, TagPatch, TagRef, DEFAULT_TAG_COLOR,
};
