//! Persistence for analysis results

use std::collections::HashMap;

use chrono::Utc;
use qari_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::types::{AnalysisResult, DetectedError, MatchResult};

/// Persist a completed analysis
pub async fn insert_result(
    pool: &SqlitePool,
    user_id: &str,
    result: &AnalysisResult,
) -> Result<()> {
    let matched_json = result
        .matched_ayah
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("serialize match: {}", e)))?;
    let errors_json = serde_json::to_string(&result.errors)
        .map_err(|e| Error::Internal(format!("serialize errors: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO analysis_results
            (request_id, user_id, surah, ayah, matched_ayah, errors,
             overall_score, recommendation, auto_accepted,
             processing_time_ms, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(result.request_id.to_string())
    .bind(user_id)
    .bind(result.matched_ayah.as_ref().map(|m| m.surah as i64))
    .bind(result.matched_ayah.as_ref().map(|m| m.ayah as i64))
    .bind(matched_json)
    .bind(errors_json)
    .bind(result.overall_score)
    .bind(&result.recommendation)
    .bind(result.auto_accepted)
    .bind(result.processing_time_ms as i64)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load a stored analysis by request id
pub async fn get_result(pool: &SqlitePool, request_id: Uuid) -> Result<Option<AnalysisResult>> {
    let row = sqlx::query(
        r#"
        SELECT matched_ayah, errors, overall_score, recommendation,
               auto_accepted, processing_time_ms
        FROM analysis_results WHERE request_id = ?
        "#,
    )
    .bind(request_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let matched_ayah: Option<MatchResult> = row
        .get::<Option<String>, _>("matched_ayah")
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("stored match corrupt: {}", e)))?;
    let errors: Vec<DetectedError> = serde_json::from_str(row.get::<String, _>("errors").as_str())
        .map_err(|e| Error::Internal(format!("stored errors corrupt: {}", e)))?;

    Ok(Some(AnalysisResult {
        request_id,
        matched_ayah,
        errors,
        overall_score: row.get("overall_score"),
        recommendation: row.get("recommendation"),
        auto_accepted: row.get("auto_accepted"),
        processing_time_ms: row.get::<i64, _>("processing_time_ms") as u64,
    }))
}

/// Aggregate statistics over stored analyses
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResultStats {
    pub total_analyses: i64,
    pub auto_accepted: i64,
    pub average_score: f64,
    pub errors_by_type: HashMap<String, i64>,
}

pub async fn result_stats(pool: &SqlitePool) -> Result<ResultStats> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(auto_accepted), 0) AS accepted,
               COALESCE(AVG(overall_score), 0.0) AS avg_score
        FROM analysis_results
        "#,
    )
    .fetch_one(pool)
    .await?;
    let total: i64 = row.get("total");
    let auto_accepted: i64 = row.get("accepted");
    let average_score: f64 = row.get("avg_score");

    // Error histograms stay Rust-side; the stored error lists are small
    let mut errors_by_type: HashMap<String, i64> = HashMap::new();
    let recent: Vec<String> = sqlx::query_scalar(
        "SELECT errors FROM analysis_results ORDER BY created_at DESC LIMIT 500",
    )
    .fetch_all(pool)
    .await?;
    for errors_json in recent {
        let errors: Vec<DetectedError> = serde_json::from_str(&errors_json)
            .map_err(|e| Error::Internal(format!("stored errors corrupt: {}", e)))?;
        for error in errors {
            *errors_by_type
                .entry(error.error_type.as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    Ok(ResultStats {
        total_analyses: total,
        auto_accepted,
        average_score,
        errors_by_type,
    })
}
