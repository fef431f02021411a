//! Image-to-video generation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use adreel_models::{GenerationStatus, JobId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    /// Remote reference of the source image
    pub image: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateVideoResponse {
    pub job_id: JobId,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GenerationStatusResponse {
    pub job_id: JobId,
    #[serde(flatten)]
    pub status: GenerationStatus,
}

/// POST /generate-video
pub async fn generate_video(
    State(state): State<AppState>,
    Json(request): Json<GenerateVideoRequest>,
) -> ApiResult<(StatusCode, Json<GenerateVideoResponse>)> {
    if request.image.trim().is_empty() {
        return Err(ApiError::validation("image must not be empty"));
    }

    let job_id = state
        .engine
        .submit_reference(request.image.trim(), request.prompt.as_deref())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateVideoResponse {
            job_id,
            status: GenerationStatus::Pending.as_str(),
        }),
    ))
}

/// GET /generate-video/:job_id
pub async fn generation_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<GenerationStatusResponse>)> {
    let job_id = JobId::from_string(job_id);
    let status = state.engine.status(&job_id).await?;

    let code = match status {
        GenerationStatus::Unknown => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    Ok((code, Json(GenerationStatusResponse { job_id, status })))
}
