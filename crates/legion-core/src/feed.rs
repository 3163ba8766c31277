//! Feed types.
//!
//! A feed is an ordered list of social content items scoped to a viewing
//! context. Cached feed entries are never authoritative; they are always
//! reconstructible from the relational store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AccountId, GenerationKind, JobId, PostId};

/// Cache TTL for a user's home feed.
pub const HOME_FEED_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache TTL for the shared explore feed.
pub const EXPLORE_FEED_TTL: Duration = Duration::from_secs(10 * 60);

/// Cache TTL for a user's profile feed.
pub const USER_FEED_TTL: Duration = Duration::from_secs(15 * 60);

/// A feed viewing context.
///
/// The TTLs are asymmetric on purpose: the globally-shared explore feed
/// changes more often than any single profile feed, while the home feed is
/// the most personal and the cheapest to recompute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedScope {
    /// Posts from accounts the viewer follows.
    Home(AccountId),

    /// Recent public posts across the platform.
    Explore,

    /// A single account's own posts.
    UserProfile(AccountId),
}

impl FeedScope {
    /// The cache key for this scope.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Home(account_id) => format!("feed:home:{account_id}"),
            Self::Explore => "feed:explore".to_string(),
            Self::UserProfile(account_id) => format!("feed:user:{account_id}"),
        }
    }

    /// The staleness bound for cached entries in this scope.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        match self {
            Self::Home(_) => HOME_FEED_TTL,
            Self::Explore => EXPLORE_FEED_TTL,
            Self::UserProfile(_) => USER_FEED_TTL,
        }
    }
}

/// One rendered feed entry: a post joined with its author and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// The post.
    pub post_id: PostId,

    /// The post's author.
    pub author_id: AccountId,

    /// Author's username at render time.
    pub author_username: String,

    /// Author's avatar at render time.
    pub author_avatar_url: Option<String>,

    /// Post caption.
    pub caption: Option<String>,

    /// The attached generation, if any.
    pub generation_id: Option<JobId>,

    /// Kind of the attached generation.
    pub generation_kind: Option<GenerationKind>,

    /// Result reference of the attached generation.
    pub result_url: Option<String>,

    /// Like count at render time. Approximate between queue drains.
    pub like_count: i64,

    /// When the post was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_embed_the_scope() {
        let account = AccountId::generate();
        assert_eq!(
            FeedScope::Home(account).cache_key(),
            format!("feed:home:{account}")
        );
        assert_eq!(FeedScope::Explore.cache_key(), "feed:explore");
        assert_eq!(
            FeedScope::UserProfile(account).cache_key(),
            format!("feed:user:{account}")
        );
    }

    #[test]
    fn ttls_are_asymmetric() {
        let account = AccountId::generate();
        assert_eq!(FeedScope::Home(account).ttl(), Duration::from_secs(300));
        assert_eq!(FeedScope::Explore.ttl(), Duration::from_secs(600));
        assert_eq!(
            FeedScope::UserProfile(account).ttl(),
            Duration::from_secs(900)
        );
    }
}
