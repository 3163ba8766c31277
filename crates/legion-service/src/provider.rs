//! AI provider HTTP client.
//!
//! Implements the opaque [`AiProvider`] seam against the external
//! generation API. No retry logic lives here; the orchestration layer
//! bounds the call with its own timeout and treats expiry as failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use legion_ledger::{AiProvider, GenerationRequest, GenerationResult, ProviderError};

/// Timeout on the underlying HTTP request. The orchestration layer applies
/// its own, usually tighter, bound on top.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for the external generation API.
#[derive(Debug, Clone)]
pub struct HttpAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Provider response payload.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    success: bool,
    #[serde(default)]
    result_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpAiProvider {
    /// Create a client for the given API endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        let url = format!("{}/v1/generations", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::new(format!("provider request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(format!(
                "provider returned {status}: {body}"
            )));
        }

        let payload: ProviderResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("malformed provider response: {e}")))?;

        if !payload.success {
            return Err(ProviderError::new(
                payload.error.unwrap_or_else(|| "generation failed".into()),
            ));
        }

        payload
            .result_url
            .map(|result_url| GenerationResult { result_url })
            .ok_or_else(|| ProviderError::new("provider response missing result reference"))
    }
}
