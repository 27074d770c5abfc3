//! REST API for the analysis service

pub mod analyze;
pub mod correction;
pub mod feedback;
pub mod sse;
pub mod ws;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Largest accepted upload; recordings are single verses, not surahs
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Create the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                .route("/recordings/analyze", post(analyze::analyze_recording))
                .route("/recordings/analyze/quick", post(analyze::quick_check))
                .route("/recordings/:request_id", get(analyze::get_result))
                .route("/correction/list", get(correction::list_samples))
                .route("/correction/audio/:sample_id", get(correction::get_sample))
                .route("/feedback/queue", get(feedback::review_queue))
                .route("/feedback/review", post(feedback::submit_review))
                .route("/feedback/flag", post(feedback::flag_recording))
                .route("/feedback/recalibrate", post(feedback::recalibrate))
                .route("/feedback/stats", get(feedback::stats))
                .route("/events", get(sse::event_stream))
                .route("/ws/recite", get(ws::recite_session)),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "module": "qari-analysis",
        "version": env!("CARGO_PKG_VERSION"),
        "database": if db_ok { "ok" } else { "error" },
        "corpus_verses": state.corpus.len(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}
