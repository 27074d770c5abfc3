//! Correction audio catalog endpoints
//!
//! Detected errors reference correction samples by id; clients resolve
//! them here. The catalog is compiled in; the audio itself is served by
//! the content CDN, so this surface returns metadata with the audio
//! URL the client should fetch.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;
use serde_json::json;

use crate::corpus::arabic::CORRECTION_SAMPLES;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CorrectionSample {
    pub id: &'static str,
    pub letter: char,
    pub description: &'static str,
    pub audio_url: String,
}

fn sample_by_id(sample_id: &str) -> Option<CorrectionSample> {
    CORRECTION_SAMPLES
        .iter()
        .find(|(id, _, _)| *id == sample_id)
        .map(|(id, letter, description)| CorrectionSample {
            id,
            letter: *letter,
            description,
            audio_url: format!("/static/corrections/{}.mp3", id),
        })
}

/// GET /api/v1/correction/list
pub async fn list_samples(State(_state): State<AppState>) -> Json<serde_json::Value> {
    let samples: Vec<CorrectionSample> = CORRECTION_SAMPLES
        .iter()
        .filter_map(|(id, _, _)| sample_by_id(id))
        .collect();
    Json(json!({ "samples": samples }))
}

/// GET /api/v1/correction/audio/{sample_id}
pub async fn get_sample(
    State(_state): State<AppState>,
    Path(sample_id): Path<String>,
) -> ApiResult<Json<CorrectionSample>> {
    sample_by_id(&sample_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("correction sample {}", sample_id)))
}
