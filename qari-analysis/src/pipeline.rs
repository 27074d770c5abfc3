//! Analysis pipeline orchestration
//!
//! One entry point per API surface: full analysis, the lightweight
//! quick check, and batch threshold recalibration. Every stage's
//! product is deterministic for identical input; the pipeline owns the
//! sequencing, persistence and event emission around the stages.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use qari_common::events::{AnalysisEvent, EventBus};
use qari_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::alignment::AlignmentEngine;
use crate::asr::AsrService;
use crate::audio;
use crate::config::AnalysisConfig;
use crate::corpus::QuranCorpus;
use crate::db;
use crate::detectors::{self, DetectorContext, TajweedDetector};
use crate::features::AudioFeatures;
use crate::matcher::{MatchOutcome, VerseMatcher};
use crate::review::{ReviewRouter, ThresholdAdjustment, ThresholdStore};
use crate::scoring::Scorer;
use crate::types::{AlignmentStatus, AnalysisResult, DetectedError, ReviewItem, RouteDecision};

/// One full-analysis request
pub struct AnalysisRequest {
    pub user_id: String,
    pub audio: Vec<u8>,
    /// Expected verse, when the client knows what was recited
    pub hint: Option<(u16, u16)>,
}

/// Quick-check response for the single-word repetition loop
#[derive(Debug, Clone, serde::Serialize)]
pub struct QuickCheckResult {
    pub passed: bool,
    pub confidence: f64,
    pub feedback: String,
    pub target_word: String,
    /// What the transcription heard at the target position, when anything
    pub detected: Option<String>,
}

pub struct AnalysisPipeline {
    config: Arc<AnalysisConfig>,
    corpus: Arc<QuranCorpus>,
    asr: Arc<dyn AsrService>,
    db: SqlitePool,
    events: EventBus,
    thresholds: Arc<ThresholdStore>,
    matcher: VerseMatcher,
    alignment: AlignmentEngine,
    scorer: Scorer,
    router: ReviewRouter,
}

impl AnalysisPipeline {
    pub fn new(
        config: Arc<AnalysisConfig>,
        corpus: Arc<QuranCorpus>,
        asr: Arc<dyn AsrService>,
        db: SqlitePool,
        events: EventBus,
        thresholds: Arc<ThresholdStore>,
    ) -> Self {
        let matcher = VerseMatcher::new(corpus.clone(), config.matcher.clone());
        let alignment = AlignmentEngine::new(config.alignment.clone());
        let scorer = Scorer::new(config.scoring.clone());
        let router = ReviewRouter::new(config.review.clone());
        Self {
            config,
            corpus,
            asr,
            db,
            events,
            thresholds,
            matcher,
            alignment,
            scorer,
            router,
        }
    }

    /// Run the full pipeline over one recording
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        self.events.emit(AnalysisEvent::AnalysisStarted {
            request_id,
            user_id: request.user_id.clone(),
            timestamp: Utc::now(),
        });

        match self.run_stages(request_id, &request, started).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.events.emit(AnalysisEvent::AnalysisFailed {
                    request_id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        request_id: Uuid,
        request: &AnalysisRequest,
        started: Instant,
    ) -> Result<AnalysisResult> {
        audio::validate_container(&request.audio)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let decoded = audio::decode_to_mono_16k(&request.audio)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let transcription = self.asr.transcribe(&request.audio).await?;
        self.events.emit(AnalysisEvent::TranscriptionReady {
            request_id,
            text: transcription.text.clone(),
            word_count: transcription.words.len(),
            timestamp: Utc::now(),
        });

        let (verse, match_result) = match self.matcher.match_verse(&transcription.text, request.hint) {
            MatchOutcome::Matched { verse, result } => (verse, result),
            MatchOutcome::NoMatch { best_score } => {
                info!(
                    request_id = %request_id,
                    best_score,
                    "no verse matched the transcription"
                );
                let result = AnalysisResult {
                    request_id,
                    matched_ayah: None,
                    errors: Vec::new(),
                    overall_score: 0.0,
                    recommendation:
                        "The recitation could not be matched to a verse. Please re-record \
                         in a quieter environment, reciting one complete verse."
                            .to_string(),
                    auto_accepted: true,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                };
                db::results::insert_result(&self.db, &request.user_id, &result).await?;
                self.emit_completed(&result);
                return Ok(result);
            }
        };

        let alignment = Arc::new(self.alignment.align(&verse, &transcription));
        let features = Arc::new(AudioFeatures::extract(&decoded));

        // A heavily degraded alignment makes every acoustic window
        // suspect; keep the errors but damp their confidence
        let degradation = alignment.degradation_ratio();
        let penalty = if degradation > self.config.alignment.degraded_ratio {
            warn!(
                request_id = %request_id,
                degradation,
                "alignment degraded; damping detector confidence"
            );
            self.config.alignment.degraded_confidence_penalty
        } else {
            1.0
        };

        let ctx = DetectorContext {
            verse: verse.clone(),
            alignment,
            features,
            config: Arc::new(self.config.detectors.clone()),
        };
        let errors = detectors::run_all(&ctx, penalty).await;

        let overall_score = self.scorer.score(&errors);
        let recommendation = self.scorer.recommendation(overall_score, &errors);

        let decision = self.router.route(&errors, &self.thresholds);
        let auto_accepted = decision == RouteDecision::AutoAccepted;
        if let RouteDecision::Queued {
            priority,
            low_confidence_errors,
        } = decision
        {
            let item = ReviewItem {
                recording_id: request_id,
                user_id: request.user_id.clone(),
                surah: match_result.surah,
                ayah: match_result.ayah,
                low_confidence_errors,
                priority,
                created_at: Utc::now(),
            };
            if db::reviews::enqueue(&self.db, &item).await? {
                self.events.emit(AnalysisEvent::ReviewQueued {
                    recording_id: request_id,
                    priority,
                    low_confidence_errors: item.low_confidence_errors.len(),
                    timestamp: Utc::now(),
                });
            }
        }

        let result = AnalysisResult {
            request_id,
            matched_ayah: Some(match_result),
            errors,
            overall_score,
            recommendation,
            auto_accepted,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        db::results::insert_result(&self.db, &request.user_id, &result).await?;
        self.emit_completed(&result);
        Ok(result)
    }

    fn emit_completed(&self, result: &AnalysisResult) {
        self.events.emit(AnalysisEvent::AnalysisCompleted {
            request_id: result.request_id,
            overall_score: result.overall_score,
            error_count: result.errors.len(),
            auto_accepted: result.auto_accepted,
            timestamp: Utc::now(),
        });
    }

    /// Reduced single-word path for the repetition loop: align the short
    /// clip against the expected verse and judge only the target word
    /// through the transcription-driven detector subset.
    pub async fn quick_check(
        &self,
        audio_bytes: &[u8],
        surah: u16,
        ayah: u16,
        target_word_index: usize,
    ) -> Result<QuickCheckResult> {
        let verse = self
            .corpus
            .get(surah, ayah)
            .ok_or_else(|| Error::NotFound(format!("verse {}:{}", surah, ayah)))?;
        if target_word_index >= verse.token_count() {
            return Err(Error::InvalidInput(format!(
                "invalid word index {}; verse {}:{} has {} words",
                target_word_index,
                surah,
                ayah,
                verse.token_count()
            )));
        }
        let target_word = verse.tokens[target_word_index].token_text.clone();

        audio::validate_container(audio_bytes).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let decoded = audio::decode_to_mono_16k(audio_bytes)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let transcription = self.asr.transcribe(audio_bytes).await?;
        if transcription.is_empty() {
            return Ok(QuickCheckResult {
                passed: false,
                confidence: 0.0,
                feedback: "No speech detected. Please try again with a clearer recording."
                    .to_string(),
                target_word,
                detected: None,
            });
        }

        let alignment = Arc::new(self.alignment.align(&verse, &transcription));
        let entry = &alignment.entries[target_word_index];
        let detected = entry.transcribed_text.clone();
        if entry.status != AlignmentStatus::Aligned {
            return Ok(QuickCheckResult {
                passed: false,
                confidence: 0.0,
                feedback: format!(
                    "The word '{}' was not heard. Listen to the correction audio and try again.",
                    target_word
                ),
                target_word,
                detected,
            });
        }
        let confidence = entry.alignment_confidence;

        let features = Arc::new(AudioFeatures::extract(&decoded));
        let ctx = DetectorContext {
            verse: verse.clone(),
            alignment: alignment.clone(),
            features,
            config: Arc::new(self.config.detectors.clone()),
        };
        let word_errors: Vec<DetectedError> =
            match detectors::substitution::SubstitutionDetector.detect(&ctx).await {
                Ok(errors) => errors
                    .into_iter()
                    .filter(|e| e.token_index == target_word_index)
                    .collect(),
                Err(e) => {
                    warn!("Quick-check detector skipped: {}", e);
                    Vec::new()
                }
            };

        let passed = word_errors.is_empty()
            && confidence >= self.config.matcher.quick_pass_threshold;
        let feedback = if passed {
            format!("Excellent! '{}' pronounced correctly.", target_word)
        } else if let Some(error) = word_errors.first() {
            error.suggestion.clone()
        } else {
            format!(
                "The word '{}' needs more practice. Listen to the correction audio and try again.",
                target_word
            )
        };

        Ok(QuickCheckResult {
            passed,
            confidence,
            feedback,
            target_word,
            detected,
        })
    }

    /// Consume unreviewed verdicts and adjust thresholds
    pub async fn recalibrate(&self) -> Result<Vec<ThresholdAdjustment>> {
        let (review_ids, samples) = db::reviews::unconsumed_samples(&self.db).await?;
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let adjustments = self.router.recalibrate(&samples, &self.thresholds);
        for adjustment in &adjustments {
            db::thresholds::save_threshold(
                &self.db,
                adjustment.error_type,
                adjustment.new_threshold,
            )
            .await?;
        }
        db::reviews::mark_consumed(&self.db, &review_ids).await?;

        if !adjustments.is_empty() {
            self.events.emit(AnalysisEvent::ThresholdsRecalibrated {
                adjusted_types: adjustments
                    .iter()
                    .map(|a| a.error_type.as_str().to_string())
                    .collect(),
                reviews_consumed: review_ids.len(),
                timestamp: Utc::now(),
            });
        }
        Ok(adjustments)
    }
}
