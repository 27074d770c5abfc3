//! API integration tests
//!
//! Exercise the full router with an in-memory database and a mock ASR
//! service; no network, no model server.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;
use uuid::Uuid;

use qari_analysis::asr::AsrService;
use qari_analysis::config::AnalysisConfig;
use qari_analysis::corpus::QuranCorpus;
use qari_analysis::db;
use qari_analysis::review::ThresholdStore;
use qari_analysis::types::{ErrorType, TranscribedWord, TranscriptionResult};
use qari_analysis::AppState;
use qari_common::events::EventBus;

#[derive(Clone)]
enum MockAsr {
    Respond(TranscriptionResult),
    Unavailable,
}

#[async_trait::async_trait]
impl AsrService for MockAsr {
    async fn transcribe(&self, _audio: &[u8]) -> qari_common::Result<TranscriptionResult> {
        match self {
            MockAsr::Respond(result) => Ok(result.clone()),
            MockAsr::Unavailable => Err(qari_common::Error::AsrUnavailable(
                "mock offline".to_string(),
            )),
        }
    }
}

fn bismillah_transcription() -> TranscriptionResult {
    let words = [
        ("بسم", 0.0, 0.35),
        ("الله", 0.4, 0.8),
        ("الرحمن", 0.9, 1.3),
        ("الرحيم", 1.4, 1.8),
    ];
    TranscriptionResult {
        text: words.iter().map(|(w, _, _)| *w).collect::<Vec<_>>().join(" "),
        words: words
            .iter()
            .map(|(w, s, e)| TranscribedWord {
                word_text: w.to_string(),
                start_time: *s,
                end_time: *e,
                word_confidence: 0.9,
            })
            .collect(),
    }
}

async fn test_state(asr: MockAsr) -> AppState {
    let config = Arc::new(AnalysisConfig::default());
    let pool = db::init_memory().await.expect("schema");
    let corpus = QuranCorpus::load(None);
    let thresholds = Arc::new(ThresholdStore::new(config.review.default_threshold));
    AppState::new(
        config,
        pool,
        corpus,
        EventBus::new(64),
        thresholds,
        Arc::new(asr),
    )
}

/// 2 seconds of silent 16-bit mono 16 kHz WAV
fn silent_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
        for _ in 0..32_000 {
            writer.write_sample(0i16).expect("sample");
        }
        writer.finalize().expect("finalize");
    }
    cursor.into_inner()
}

const BOUNDARY: &str = "qari-test-boundary";

fn multipart_body(audio: Option<&[u8]>, fields: &[(&str, &str)]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"recitation.wav\"\r\nContent-Type: audio/wav\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (
        format!("multipart/form-data; boundary={}", BOUNDARY),
        body,
    )
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "qari-analysis");
    assert!(json["corpus_verses"].as_u64().expect("verses") > 0);
}

#[tokio::test]
async fn test_analyze_matches_and_persists() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(Some(&wav), &[("user_id", "student-1")]);
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["matched_ayah"]["surah"], 1);
    assert_eq!(json["matched_ayah"]["ayah"], 1);
    assert!(json["matched_ayah"]["confidence"].as_f64().expect("conf") > 0.9);
    // Silent audio cannot satisfy the duration/nasalization rules
    assert!(!json["errors"].as_array().expect("errors").is_empty());
    let score = json["overall_score"].as_f64().expect("score");
    assert!((0.0..1.0).contains(&score));

    // The result is retrievable afterwards
    let request_id = json["request_id"].as_str().expect("id").to_string();
    let response = app
        .oneshot(
            Request::get(format!("/api/v1/recordings/{}", request_id))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let stored = response_json(response).await;
    assert_eq!(stored["request_id"], request_id.as_str());
}

#[tokio::test]
async fn test_analyze_rejects_non_audio_upload() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let (content_type, body) = multipart_body(Some(b"definitely not audio"), &[]);
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = response_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_analyze_maps_asr_outage_to_503() {
    let state = test_state(MockAsr::Unavailable).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(Some(&wav), &[]);
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = response_json(response).await;
    assert_eq!(json["error"]["code"], "ASR_UNAVAILABLE");
    assert_eq!(json["error"]["retryable"], true);
}

#[tokio::test]
async fn test_quick_check_passes_target_word() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(
        Some(&wav),
        &[("surah", "1"), ("ayah", "1"), ("target_word_index", "1")],
    );
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze/quick")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["passed"], true);
    assert!(json["confidence"].as_f64().expect("confidence") > 0.9);
    assert_eq!(json["detected"], "الله");
    assert!(json["target_word"].as_str().expect("target_word").contains("الل"));
    assert!(json["feedback"]
        .as_str()
        .expect("feedback")
        .starts_with("Excellent"));
}

#[tokio::test]
async fn test_quick_check_fails_substituted_target_word() {
    // كل for قل in 112:1
    let words = [
        ("كل", 0.0, 0.3),
        ("هو", 0.4, 0.6),
        ("الله", 0.7, 1.1),
        ("احد", 1.2, 1.6),
    ];
    let transcription = TranscriptionResult {
        text: words.iter().map(|(w, _, _)| *w).collect::<Vec<_>>().join(" "),
        words: words
            .iter()
            .map(|(w, s, e)| TranscribedWord {
                word_text: w.to_string(),
                start_time: *s,
                end_time: *e,
                word_confidence: 0.9,
            })
            .collect(),
    };
    let state = test_state(MockAsr::Respond(transcription)).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(
        Some(&wav),
        &[("surah", "112"), ("ayah", "1"), ("target_word_index", "0")],
    );
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze/quick")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["passed"], false);
    assert_eq!(json["detected"], "كل");
    assert!(!json["feedback"].as_str().expect("feedback").is_empty());
}

#[tokio::test]
async fn test_quick_check_unknown_verse_is_404() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(
        Some(&wav),
        &[("surah", "99"), ("ayah", "99"), ("target_word_index", "0")],
    );
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze/quick")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quick_check_word_index_out_of_range_is_400() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(
        Some(&wav),
        &[("surah", "1"), ("ayah", "1"), ("target_word_index", "10")],
    );
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze/quick")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_surah_is_rejected_before_pipeline() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) =
        multipart_body(Some(&wav), &[("surah", "500"), ("ayah", "1")]);
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (content_type, body) = multipart_body(
        Some(&wav),
        &[("surah", "500"), ("ayah", "1"), ("target_word_index", "0")],
    );
    let response = app
        .oneshot(
            Request::post("/api/v1/recordings/analyze/quick")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_result_is_404() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/recordings/{}", Uuid::new_v4()))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_flow_queue_review_recalibrate() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    // Force every madd_short below its threshold so the analysis queues
    state.thresholds.set(ErrorType::MaddShort, 0.95);
    let app = qari_analysis::build_router(state.clone());

    let wav = silent_wav();
    let (content_type, body) = multipart_body(Some(&wav), &[("user_id", "student-1")]);
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let analysis = response_json(response).await;
    assert_eq!(analysis["auto_accepted"], false);
    let recording_id = analysis["request_id"].as_str().expect("id").to_string();

    // The recording shows up in the queue
    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/feedback/queue")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let queue = response_json(response).await;
    assert_eq!(queue["queue_depth"], 1);
    assert_eq!(queue["items"][0]["recording_id"], recording_id.as_str());

    // Confirm three madd_short detections; the stored error list is
    // sorted by (token_index, type), placing them at indexes 1, 3, 5
    let errors = analysis["errors"].as_array().expect("errors");
    let madd_indexes: Vec<usize> = errors
        .iter()
        .enumerate()
        .filter(|(_, e)| e["type"] == "madd_short")
        .map(|(i, _)| i)
        .collect();
    assert!(madd_indexes.len() >= 3);
    let verdicts: Vec<serde_json::Value> = madd_indexes
        .iter()
        .take(3)
        .map(|i| {
            serde_json::json!({
                "error_index": i,
                "is_correct": true,
                "actual_error_type": null,
                "notes": null,
            })
        })
        .collect();
    let review = serde_json::json!({
        "recording_id": recording_id,
        "reviewer_id": "teacher-1",
        "verdicts": verdicts,
        "overall_assessment": "detections accurate",
        "notes": null,
    });
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/feedback/review")
                .header("content-type", "application/json")
                .body(Body::from(review.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // Three confirmations lower the madd_short threshold by one step
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/feedback/recalibrate")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    let adjustments = json["adjustments"].as_array().expect("adjustments");
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0]["error_type"], "madd_short");
    assert!((adjustments[0]["new_threshold"].as_f64().expect("threshold") - 0.90).abs() < 1e-9);

    // Consumed verdicts do not recalibrate twice
    let response = app
        .oneshot(
            Request::post("/api/v1/feedback/recalibrate")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let json = response_json(response).await;
    assert!(json["adjustments"].as_array().expect("adjustments").is_empty());
}

#[tokio::test]
async fn test_flag_forces_recording_into_queue() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(Some(&wav), &[]);
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    let analysis = response_json(response).await;
    // Default thresholds auto-accept the silent-audio detections
    assert_eq!(analysis["auto_accepted"], true);
    let recording_id = analysis["request_id"].as_str().expect("id").to_string();

    let flag = serde_json::json!({ "recording_id": recording_id, "reason": "score too harsh" });
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/feedback/flag")
                .header("content-type", "application/json")
                .body(Body::from(flag.to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get("/api/v1/feedback/queue")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let queue = response_json(response).await;
    assert_eq!(queue["queue_depth"], 1);
    assert_eq!(queue["items"][0]["priority"], 1000);
}

#[tokio::test]
async fn test_correction_catalog() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/v1/correction/audio/qa_01")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["id"], "qa_01");
    assert_eq!(json["letter"], "ق");

    let response = app
        .oneshot(
            Request::get("/api/v1/correction/audio/unknown_id")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_reflect_analyses() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(Some(&wav), &[]);
    app.clone()
        .oneshot(
            Request::post("/api/v1/recordings/analyze")
                .header("content-type", &content_type)
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    let response = app
        .oneshot(
            Request::get("/api/v1/feedback/stats")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["results"]["total_analyses"], 1);
    assert!(json["thresholds"]["madd_short"].as_f64().is_some());
}

#[tokio::test]
async fn test_events_emitted_during_analysis() {
    let state = test_state(MockAsr::Respond(bismillah_transcription())).await;
    let mut rx = state.events.subscribe();
    let app = qari_analysis::build_router(state);

    let wav = silent_wav();
    let (content_type, body) = multipart_body(Some(&wav), &[]);
    app.oneshot(
        Request::post("/api/v1/recordings/analyze")
            .header("content-type", &content_type)
            .body(Body::from(body))
            .expect("request"),
    )
    .await
    .expect("response");

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.event_type());
    }
    assert!(names.contains(&"AnalysisStarted"));
    assert!(names.contains(&"TranscriptionReady"));
    assert!(names.contains(&"AnalysisCompleted"));
}
