//! Composition endpoints.
//!
//! Both run the pipeline in the request task and answer with the stored
//! result once it is uploaded.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use adreel_models::{CaptionPosition, CompositionSpec, StackPosition};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const TEXT_POSITIONS: [&str; 3] = ["top", "center", "bottom"];

/// Concat run: captioned avatar clip followed by the demo clip.
#[derive(Debug, Deserialize)]
pub struct ProcessVideoRequest {
    /// Caption burned into the avatar clip
    #[serde(default)]
    pub text: String,
    pub avatar_video: String,
    pub real_video: String,
    #[serde(rename = "fontStyle")]
    pub font_style: String,
    #[serde(default)]
    pub bgm: Option<String>,
    pub text_position: String,
}

/// Stack run: `real_video` keeps its audio, `game_video` fills the rest.
#[derive(Debug, Deserialize)]
pub struct VerticalConcatRequest {
    pub real_video: String,
    pub game_video: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub bgm: Option<String>,
    #[serde(default)]
    pub bgm_volume: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct CompositionResponse {
    pub success: bool,
    pub s3_url: String,
}

/// POST /process-video
pub async fn process_video(
    State(state): State<AppState>,
    Json(request): Json<ProcessVideoRequest>,
) -> ApiResult<Json<CompositionResponse>> {
    let position = request.text_position.trim().to_ascii_lowercase();
    if !TEXT_POSITIONS.contains(&position.as_str()) {
        return Err(ApiError::validation(format!(
            "Invalid text_position. Must be one of: {}",
            TEXT_POSITIONS.join(", ")
        )));
    }

    let mut spec = CompositionSpec::concat(request.avatar_video, request.real_video)
        .with_caption(
            request.text,
            CaptionPosition::parse_lenient(&position),
            request.font_style,
        );
    if let Some(bgm) = non_blank(request.bgm) {
        spec = spec.with_bgm(bgm, None);
    }

    run(&state, spec).await
}

/// POST /vertical-concat
pub async fn vertical_concat(
    State(state): State<AppState>,
    Json(request): Json<VerticalConcatRequest>,
) -> ApiResult<Json<CompositionResponse>> {
    let position = request
        .position
        .as_deref()
        .map(StackPosition::parse_lenient)
        .unwrap_or_default();

    let mut spec =
        CompositionSpec::vertical_stack(request.real_video, request.game_video, position);
    match non_blank(request.bgm) {
        Some(bgm) => spec = spec.with_bgm(bgm, request.bgm_volume),
        // A volume without music is still checked
        None => spec.bgm_volume = request.bgm_volume,
    }

    run(&state, spec).await
}

async fn run(state: &AppState, spec: CompositionSpec) -> ApiResult<Json<CompositionResponse>> {
    let run_id = Uuid::new_v4().to_string();
    let workspace = state.worker.run_dir(&run_id);
    info!(run_id = %run_id, mode = %spec.mode, "Starting composition run");

    let outcome = state.pipeline.run(&spec, &workspace).await?;

    Ok(Json(CompositionResponse {
        success: true,
        s3_url: outcome.result_ref,
    }))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
