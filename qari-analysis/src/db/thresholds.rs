//! Persistence for per-error-type review thresholds

use std::collections::HashMap;

use chrono::Utc;
use qari_common::Result;
use sqlx::{Row, SqlitePool};

use crate::types::ErrorType;

/// Load every stored threshold; unknown error type names are skipped so
/// an old database cannot wedge startup
pub async fn load_thresholds(pool: &SqlitePool) -> Result<HashMap<ErrorType, f64>> {
    let rows = sqlx::query("SELECT error_type, threshold FROM error_type_thresholds")
        .fetch_all(pool)
        .await?;

    let mut thresholds = HashMap::new();
    for row in rows {
        let name: String = row.get("error_type");
        if let Some(error_type) = ErrorType::parse(&name) {
            thresholds.insert(error_type, row.get::<f64, _>("threshold"));
        }
    }
    Ok(thresholds)
}

/// Upsert one threshold
pub async fn save_threshold(
    pool: &SqlitePool,
    error_type: ErrorType,
    threshold: f64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO error_type_thresholds (error_type, threshold, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(error_type) DO UPDATE SET
            threshold = excluded.threshold,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(error_type.as_str())
    .bind(threshold)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}
