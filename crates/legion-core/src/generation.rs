//! Generation job types.
//!
//! A job represents one AI invocation. Credits are debited atomically
//! before the job is submitted, so an account can never have more
//! concurrent in-flight generations than its balance allows; a failed job
//! triggers a compensating refund.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, JobId};

/// Credit cost of an image generation.
pub const IMAGE_CREDIT_COST: i64 = 10;

/// Credit cost of a video generation.
pub const VIDEO_CREDIT_COST: i64 = 50;

/// Credit cost of a text generation.
pub const TEXT_CREDIT_COST: i64 = 5;

/// What kind of content a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Image generation.
    Image,

    /// Video generation.
    Video,

    /// Text generation.
    Text,
}

impl GenerationKind {
    /// Credits charged for one generation of this kind.
    #[must_use]
    pub const fn credit_cost(self) -> i64 {
        match self {
            Self::Image => IMAGE_CREDIT_COST,
            Self::Video => VIDEO_CREDIT_COST,
            Self::Text => TEXT_CREDIT_COST,
        }
    }

    /// Wire representation, matching the relational enum.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Text => "text",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted to the provider, awaiting a result.
    Processing,

    /// Provider returned a result.
    Completed,

    /// Provider failed; the debit has been refunded.
    Failed,
}

impl JobStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One AI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Unique job ID.
    pub id: JobId,

    /// The owning account.
    pub account_id: AccountId,

    /// The prompt submitted to the provider.
    pub prompt: String,

    /// What kind of content the job produces.
    pub kind: GenerationKind,

    /// Credits debited for this job.
    pub credits_cost: i64,

    /// Current status.
    pub status: JobStatus,

    /// Reference to the generated result, once completed.
    pub result_url: Option<String>,

    /// Whether the result may appear in public feeds.
    pub is_public: bool,

    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a job in `processing` status, charged at the kind's cost.
    #[must_use]
    pub fn new(account_id: AccountId, prompt: String, kind: GenerationKind, is_public: bool) -> Self {
        Self {
            id: JobId::generate(),
            account_id,
            prompt,
            kind,
            credits_cost: kind.credit_cost(),
            status: JobStatus::Processing,
            result_url: None,
            is_public,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_costs() {
        assert_eq!(GenerationKind::Image.credit_cost(), 10);
        assert_eq!(GenerationKind::Video.credit_cost(), 50);
        assert_eq!(GenerationKind::Text.credit_cost(), 5);
    }

    #[test]
    fn new_job_is_processing() {
        let job = GenerationJob::new(
            AccountId::generate(),
            "a cat in a hat".into(),
            GenerationKind::Image,
            true,
        );
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.credits_cost, 10);
        assert!(job.result_url.is_none());
    }

    #[test]
    fn kind_wire_roundtrip() {
        for kind in [
            GenerationKind::Image,
            GenerationKind::Video,
            GenerationKind::Text,
        ] {
            assert_eq!(GenerationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(GenerationKind::parse("audio"), None);
    }
}
