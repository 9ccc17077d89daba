//! AI summarization route

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    summarizer::SummarizeError,
};

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

/// Summarize session notes or a chat log
pub async fn summarize(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Please provide text to summarize.".to_string(),
        ));
    }

    let summary = state
        .summarizer
        .summarize(&req.text)
        .await
        .map_err(|e| match e {
            SummarizeError::NotConfigured => ApiError::ServiceUnavailable,
            SummarizeError::Request(_)
            | SummarizeError::Upstream(_)
            | SummarizeError::MalformedResponse => {
                tracing::error!(error = %e, "Summarization failed");
                ApiError::SummarizationFailed
            }
        })?;

    Ok(Json(SummarizeResponse { summary }))
}
