//! Post types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, JobId, PostId};

/// Who can see a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Visible everywhere, including the explore feed.
    Public,

    /// Visible to followers only.
    Followers,

    /// Visible to the author only.
    Private,
}

impl Visibility {
    /// Wire representation, matching the relational enum.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Followers => "followers",
            Self::Private => "private",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "followers" => Some(Self::Followers),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A social post, optionally attached to a generation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique post ID.
    pub id: PostId,

    /// The posting account.
    pub account_id: AccountId,

    /// The attached generation job, if any.
    pub generation_id: Option<JobId>,

    /// Caption text.
    pub caption: Option<String>,

    /// Who can see the post.
    pub visibility: Visibility,

    /// When the post was created.
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        generation_id: Option<JobId>,
        caption: Option<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: PostId::generate(),
            account_id,
            generation_id,
            caption,
            visibility,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_wire_roundtrip() {
        for v in [Visibility::Public, Visibility::Followers, Visibility::Private] {
            assert_eq!(Visibility::parse(v.as_str()), Some(v));
        }
        assert_eq!(Visibility::parse("unlisted"), None);
    }
}
