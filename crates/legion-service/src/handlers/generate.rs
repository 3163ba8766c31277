//! Generation handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use legion_core::{GenerationKind, JobId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Minimum prompt length.
const PROMPT_MIN_CHARS: usize = 3;

/// Maximum prompt length.
const PROMPT_MAX_CHARS: usize = 2000;

/// Generation request body.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// The prompt to generate from.
    pub prompt: String,

    /// What kind of content to generate.
    pub kind: GenerationKind,

    /// Optional style hint passed to the provider.
    #[serde(default)]
    pub style: Option<String>,

    /// Whether the result may appear in public feeds.
    #[serde(default = "default_public")]
    pub is_public: bool,
}

const fn default_public() -> bool {
    true
}

/// A generation job as returned over the wire.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    /// Job identifier.
    pub id: String,

    /// The prompt.
    pub prompt: String,

    /// What was generated.
    pub kind: GenerationKind,

    /// Credits charged.
    pub credits_cost: i64,

    /// Current status.
    pub status: String,

    /// Result reference, once completed.
    pub result_url: Option<String>,

    /// When the job was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<legion_core::GenerationJob> for JobResponse {
    fn from(job: legion_core::GenerationJob) -> Self {
        Self {
            id: job.id.to_string(),
            prompt: job.prompt,
            kind: job.kind,
            credits_cost: job.credits_cost,
            status: job.status.as_str().to_string(),
            result_url: job.result_url,
            created_at: job.created_at,
        }
    }
}

/// Generation response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Whether the generation completed.
    pub success: bool,

    /// The completed job.
    pub job: JobResponse,

    /// Balance remaining after the debit.
    pub credits_remaining: i64,
}

/// Run one generation end to end.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = body.prompt.trim();
    if prompt.chars().count() < PROMPT_MIN_CHARS {
        return Err(ApiError::BadRequest(format!(
            "prompt must be at least {PROMPT_MIN_CHARS} characters"
        )));
    }
    if prompt.chars().count() > PROMPT_MAX_CHARS {
        return Err(ApiError::BadRequest("prompt is too long".into()));
    }

    let generation = state
        .generation
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("AI provider not configured".into()))?;

    let outcome = generation
        .generate(
            &auth.account_id,
            prompt.to_string(),
            body.kind,
            body.style,
            body.is_public,
        )
        .await?;

    Ok(Json(GenerateResponse {
        success: true,
        job: outcome.job.into(),
        credits_remaining: outcome.balance_remaining,
    }))
}

/// Get the status of one of the caller's jobs.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid job id".into()))?;

    let job = state
        .store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("generation job not found: {job_id}")))?;

    // Jobs are private to their owner.
    if job.account_id != auth.account_id {
        return Err(ApiError::NotFound(format!(
            "generation job not found: {job_id}"
        )));
    }

    Ok(Json(job.into()))
}

/// Job history response.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    /// The caller's jobs, newest first.
    pub jobs: Vec<JobResponse>,
}

/// List the caller's generation history.
pub async fn job_history(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    pagination: axum::extract::Query<super::feed::Pagination>,
) -> Result<Json<JobListResponse>, ApiError> {
    let (limit, offset) = pagination.limit_offset();
    let jobs = state
        .store
        .list_jobs(&auth.account_id, limit, offset)
        .await?;

    Ok(Json(JobListResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}
