//! Human feedback endpoints: review queue, verdicts, flags and
//! threshold recalibration

use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::types::{HumanReview, ReviewItem};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// GET /api/v1/feedback/queue
pub async fn review_queue(
    State(state): State<AppState>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let limit = query.limit.clamp(1, 100);
    let items = db::reviews::pending(&state.db, limit).await?;
    let depth = db::reviews::queue_depth(&state.db).await?;
    Ok(Json(json!({ "items": items, "queue_depth": depth })))
}

/// POST /api/v1/feedback/review
pub async fn submit_review(
    State(state): State<AppState>,
    Json(review): Json<HumanReview>,
) -> ApiResult<Json<serde_json::Value>> {
    if review.reviewer_id.trim().is_empty() {
        return Err(ApiError::BadRequest("reviewer_id is required".to_string()));
    }
    db::reviews::submit_review(&state.db, &review).await?;
    Ok(Json(json!({
        "status": "recorded",
        "recording_id": review.recording_id,
        "verdicts": review.verdicts.len(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct FlagRequest {
    pub recording_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Flagged recordings outrank any confidence-scored enqueue
const FLAG_PRIORITY: i64 = 1000;

/// POST /api/v1/feedback/flag
///
/// A user disputing their assessment forces the recording into the
/// review queue regardless of the router's original decision.
pub async fn flag_recording(
    State(state): State<AppState>,
    Json(request): Json<FlagRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let result = db::results::get_result(&state.db, request.recording_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("analysis {}", request.recording_id)))?;

    let (surah, ayah) = result
        .matched_ayah
        .as_ref()
        .map(|m| (m.surah, m.ayah))
        .unwrap_or((0, 0));
    let item = ReviewItem {
        recording_id: request.recording_id,
        user_id: "flagged".to_string(),
        surah,
        ayah,
        low_confidence_errors: result.errors,
        priority: FLAG_PRIORITY,
        created_at: Utc::now(),
    };
    db::reviews::flag(&state.db, &item).await?;

    tracing::info!(
        recording_id = %request.recording_id,
        reason = request.reason.as_deref().unwrap_or("unspecified"),
        "recording flagged for review"
    );
    Ok(Json(json!({
        "status": "queued",
        "recording_id": request.recording_id,
        "priority": FLAG_PRIORITY,
    })))
}

/// POST /api/v1/feedback/recalibrate
///
/// Consume accumulated verdicts and adjust per-type thresholds.
pub async fn recalibrate(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let adjustments = state.pipeline.recalibrate().await?;
    let changes: Vec<serde_json::Value> = adjustments
        .iter()
        .map(|a| {
            json!({
                "error_type": a.error_type.as_str(),
                "old_threshold": a.old_threshold,
                "new_threshold": a.new_threshold,
            })
        })
        .collect();
    Ok(Json(json!({ "adjustments": changes })))
}

/// GET /api/v1/feedback/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let results = db::results::result_stats(&state.db).await?;
    let queue_depth = db::reviews::queue_depth(&state.db).await?;
    let thresholds: serde_json::Map<String, serde_json::Value> = state
        .thresholds
        .snapshot()
        .into_iter()
        .map(|(t, v)| (t.as_str().to_string(), json!(v)))
        .collect();
    Ok(Json(json!({
        "results": results,
        "queue_depth": queue_depth,
        "thresholds": thresholds,
    })))
}
