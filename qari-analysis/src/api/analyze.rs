//! Recording analysis endpoints

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{AnalysisRequest, QuickCheckResult};
use crate::types::AnalysisResult;
use crate::AppState;

/// Highest surah number in the Quran
const SURAH_MAX: u16 = 114;

/// Parsed multipart upload
struct Upload {
    audio: Vec<u8>,
    surah: Option<u16>,
    ayah: Option<u16>,
    target_word_index: Option<usize>,
    user_id: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut upload = Upload {
        audio: Vec::new(),
        surah: None,
        ayah: None,
        target_word_index: None,
        user_id: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") | Some("audio") => {
                upload.audio = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("audio upload failed: {}", e)))?
                    .to_vec();
            }
            Some("surah") => upload.surah = Some(parse_verse_part(field, "surah").await?),
            Some("ayah") => upload.ayah = Some(parse_verse_part(field, "ayah").await?),
            Some("target_word_index") => {
                upload.target_word_index =
                    Some(parse_verse_part(field, "target_word_index").await? as usize)
            }
            Some("user_id") => {
                upload.user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("user_id field: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    if upload.audio.is_empty() {
        return Err(ApiError::BadRequest(
            "missing audio file field 'file'".to_string(),
        ));
    }
    Ok(upload)
}

/// Reject out-of-range verse references before any pipeline work
fn validate_reference(surah: u16, ayah: u16) -> ApiResult<()> {
    if surah < 1 || surah > SURAH_MAX {
        return Err(ApiError::BadRequest(format!(
            "surah must be between 1 and {}, got {}",
            SURAH_MAX, surah
        )));
    }
    if ayah < 1 {
        return Err(ApiError::BadRequest(format!(
            "ayah must be at least 1, got {}",
            ayah
        )));
    }
    Ok(())
}

async fn parse_verse_part(field: axum::extract::multipart::Field<'_>, name: &str) -> ApiResult<u16> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("{} field: {}", name, e)))?;
    text.trim()
        .parse::<u16>()
        .map_err(|_| ApiError::BadRequest(format!("{} must be a number, got '{}'", name, text)))
}

/// POST /api/v1/recordings/analyze
///
/// Multipart upload: `file` (audio), optional `surah`/`ayah` hint,
/// optional `user_id`.
pub async fn analyze_recording(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AnalysisResult>> {
    let upload = read_upload(multipart).await?;
    let hint = match (upload.surah, upload.ayah) {
        (Some(s), Some(a)) => {
            validate_reference(s, a)?;
            Some((s, a))
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "surah and ayah must be provided together".to_string(),
            ))
        }
    };

    let result = state
        .pipeline
        .analyze(AnalysisRequest {
            user_id: upload.user_id.unwrap_or_else(|| "anonymous".to_string()),
            audio: upload.audio,
            hint,
        })
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/recordings/analyze/quick
///
/// Single-word check for the repetition loop: requires `surah`, `ayah`
/// and `target_word_index`, returns pass/fail with feedback for that
/// word only.
pub async fn quick_check(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<QuickCheckResult>> {
    let upload = read_upload(multipart).await?;
    let (surah, ayah) = upload.surah.zip(upload.ayah).ok_or_else(|| {
        ApiError::BadRequest("quick check requires surah and ayah fields".to_string())
    })?;
    validate_reference(surah, ayah)?;
    let target_word_index = upload.target_word_index.ok_or_else(|| {
        ApiError::BadRequest("quick check requires a target_word_index field".to_string())
    })?;

    let result = state
        .pipeline
        .quick_check(&upload.audio, surah, ayah, target_word_index)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/recordings/{request_id}
pub async fn get_result(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<AnalysisResult>> {
    let result = crate::db::results::get_result(&state.db, request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("analysis {}", request_id)))?;
    Ok(Json(result))
}
