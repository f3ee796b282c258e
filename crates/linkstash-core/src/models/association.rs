//! Post-tag join rows

use serde::{Deserialize, Serialize};

use super::{PostId, Tag};

/// An association row with its tag resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedTag {
    pub post_id: PostId,
    pub tag: Tag,
}
