//! Review queue and human review persistence
//!
//! The queue is keyed by recording id, so routing the same analysis
//! twice cannot produce a duplicate entry.

use chrono::{DateTime, Utc};
use qari_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::types::{DetectedError, ErrorType, ErrorVerdict, HumanReview, ReviewItem};

/// Enqueue a recording for review; returns false when it was already
/// queued
pub async fn enqueue(pool: &SqlitePool, item: &ReviewItem) -> Result<bool> {
    let errors_json = serde_json::to_string(&item.low_confidence_errors)
        .map_err(|e| Error::Internal(format!("serialize queue errors: {}", e)))?;

    let outcome = sqlx::query(
        r#"
        INSERT INTO review_queue
            (recording_id, user_id, surah, ayah, low_confidence_errors,
             priority, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
        ON CONFLICT(recording_id) DO NOTHING
        "#,
    )
    .bind(item.recording_id.to_string())
    .bind(&item.user_id)
    .bind(item.surah as i64)
    .bind(item.ayah as i64)
    .bind(errors_json)
    .bind(item.priority)
    .bind(item.created_at.timestamp())
    .execute(pool)
    .await?;
    Ok(outcome.rows_affected() == 1)
}

/// Re-queue (or raise the priority of) a recording a user flagged as
/// wrongly assessed
pub async fn flag(pool: &SqlitePool, item: &ReviewItem) -> Result<()> {
    let errors_json = serde_json::to_string(&item.low_confidence_errors)
        .map_err(|e| Error::Internal(format!("serialize queue errors: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO review_queue
            (recording_id, user_id, surah, ayah, low_confidence_errors,
             priority, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
        ON CONFLICT(recording_id) DO UPDATE SET
            priority = MAX(priority, excluded.priority),
            status = 'pending'
        "#,
    )
    .bind(item.recording_id.to_string())
    .bind(&item.user_id)
    .bind(item.surah as i64)
    .bind(item.ayah as i64)
    .bind(errors_json)
    .bind(item.priority)
    .bind(item.created_at.timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Effective-priority boost per minute an item has waited
const AGE_BOOST_PER_MINUTE: i64 = 1;

/// Pending queue entries, most urgent first
///
/// Ordering uses an effective priority computed at read time: the
/// stored priority plus one point per minute waited, so an old
/// low-priority item eventually outranks a steady stream of fresh
/// higher-priority arrivals.
pub async fn pending(pool: &SqlitePool, limit: i64) -> Result<Vec<ReviewItem>> {
    let rows = sqlx::query(
        r#"
        SELECT recording_id, user_id, surah, ayah, low_confidence_errors,
               priority, created_at
        FROM review_queue
        WHERE status = 'pending'
        ORDER BY priority + ((? - created_at) / 60) * ? DESC, created_at ASC
        LIMIT ?
        "#,
    )
    .bind(Utc::now().timestamp())
    .bind(AGE_BOOST_PER_MINUTE)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_item).collect()
}

pub async fn queue_depth(pool: &SqlitePool) -> Result<i64> {
    let depth = sqlx::query_scalar(
        "SELECT COUNT(*) FROM review_queue WHERE status = 'pending'",
    )
    .fetch_one(pool)
    .await?;
    Ok(depth)
}

fn row_to_item(row: sqlx::sqlite::SqliteRow) -> Result<ReviewItem> {
    let recording_id = Uuid::parse_str(row.get::<String, _>("recording_id").as_str())
        .map_err(|e| Error::Internal(format!("stored recording id corrupt: {}", e)))?;
    let low_confidence_errors: Vec<DetectedError> =
        serde_json::from_str(row.get::<String, _>("low_confidence_errors").as_str())
            .map_err(|e| Error::Internal(format!("stored queue errors corrupt: {}", e)))?;
    let created_at = DateTime::<Utc>::from_timestamp(row.get::<i64, _>("created_at"), 0)
        .ok_or_else(|| Error::Internal("stored timestamp out of range".to_string()))?;

    Ok(ReviewItem {
        recording_id,
        user_id: row.get("user_id"),
        surah: row.get::<i64, _>("surah") as u16,
        ayah: row.get::<i64, _>("ayah") as u16,
        low_confidence_errors,
        priority: row.get("priority"),
        created_at,
    })
}

/// Record a reviewer's verdicts and close the queue entry
pub async fn submit_review(pool: &SqlitePool, review: &HumanReview) -> Result<()> {
    let queued: Option<String> = sqlx::query_scalar(
        "SELECT recording_id FROM review_queue WHERE recording_id = ?",
    )
    .bind(review.recording_id.to_string())
    .fetch_optional(pool)
    .await?;
    if queued.is_none() {
        return Err(Error::NotFound(format!(
            "recording {} is not in the review queue",
            review.recording_id
        )));
    }

    let verdicts_json = serde_json::to_string(&review.verdicts)
        .map_err(|e| Error::Internal(format!("serialize verdicts: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO human_reviews
            (recording_id, reviewer_id, verdicts, overall_assessment,
             notes, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(review.recording_id.to_string())
    .bind(&review.reviewer_id)
    .bind(verdicts_json)
    .bind(&review.overall_assessment)
    .bind(&review.notes)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;

    sqlx::query("UPDATE review_queue SET status = 'reviewed' WHERE recording_id = ?")
        .bind(review.recording_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Verdict samples not yet consumed by recalibration, resolved against
/// the stored error lists they judged
pub async fn unconsumed_samples(
    pool: &SqlitePool,
) -> Result<(Vec<i64>, Vec<(ErrorType, bool)>)> {
    let rows = sqlx::query(
        r#"
        SELECT hr.id, hr.verdicts, ar.errors
        FROM human_reviews hr
        JOIN analysis_results ar ON ar.request_id = hr.recording_id
        WHERE hr.consumed = 0
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut review_ids = Vec::new();
    let mut samples = Vec::new();
    for row in rows {
        review_ids.push(row.get::<i64, _>("id"));
        let verdicts: Vec<ErrorVerdict> =
            serde_json::from_str(row.get::<String, _>("verdicts").as_str())
                .map_err(|e| Error::Internal(format!("stored verdicts corrupt: {}", e)))?;
        let errors: Vec<DetectedError> =
            serde_json::from_str(row.get::<String, _>("errors").as_str())
                .map_err(|e| Error::Internal(format!("stored errors corrupt: {}", e)))?;

        for verdict in verdicts {
            // Verdicts over indexes the stored list does not have are
            // reviewer input errors; skip rather than fail the batch
            let Some(error) = errors.get(verdict.error_index) else {
                continue;
            };
            samples.push((error.error_type, verdict.is_correct));
        }
    }
    Ok((review_ids, samples))
}

/// Mark a recalibration batch consumed
pub async fn mark_consumed(pool: &SqlitePool, review_ids: &[i64]) -> Result<()> {
    for id in review_ids {
        sqlx::query("UPDATE human_reviews SET consumed = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
    }
    Ok(())
}
