//! Tajweed rule engine
//!
//! A fixed, closed set of detectors, each consuming the aligned segment
//! for a rule-relevant token plus acoustic features and producing zero
//! or more typed errors. Detectors are independent: they share no
//! mutable state, their execution order does not affect output, and a
//! failing detector is skipped without aborting the engine.

pub mod adjacency;
pub mod ghunnah;
pub mod madd;
pub mod missing_word;
pub mod qalqalah;
pub mod substitution;

use crate::config::DetectorConfig;
use crate::corpus::annotations::LetterAnnotation;
use crate::corpus::VerseReference;
use crate::features::AudioFeatures;
use crate::types::{AlignmentEntry, AlignmentMap, DetectedError};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Detector failure; isolated per detector, never fatal to the engine
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Feature extraction failed: {0}")]
    Features(String),

    #[error("Detector failed: {0}")]
    Failed(String),
}

/// Everything one detector pass may read; shared read-only
#[derive(Clone)]
pub struct DetectorContext {
    pub verse: Arc<VerseReference>,
    pub alignment: Arc<AlignmentMap>,
    pub features: Arc<AudioFeatures>,
    pub config: Arc<DetectorConfig>,
}

impl DetectorContext {
    /// Whether acoustic measures can be trusted for this recording
    pub fn features_usable(&self) -> bool {
        self.features.usable(self.config.max_clipped_fraction)
    }
}

/// One tajweed rule detector
///
/// Implementations must be deterministic given identical context: no
/// hidden randomness, no wall-clock reads. Detectors needing acoustic
/// features fail closed when the features are unusable.
#[async_trait::async_trait]
pub trait TajweedDetector: Send + Sync {
    /// Detector name for logging and provenance
    fn name(&self) -> &'static str;

    /// Run the detector over the full alignment map
    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError>;
}

static SUBSTITUTION: substitution::SubstitutionDetector = substitution::SubstitutionDetector;
static MISSING_WORD: missing_word::MissingWordDetector = missing_word::MissingWordDetector;
static MADD: madd::MaddDetector = madd::MaddDetector;
static GHUNNAH: ghunnah::GhunnahDetector = ghunnah::GhunnahDetector;
static QALQALAH: qalqalah::QalqalahDetector = qalqalah::QalqalahDetector;
static ADJACENCY: adjacency::AdjacencyDetector = adjacency::AdjacencyDetector;

/// Static registry of all detector variants
pub fn registry() -> &'static [&'static dyn TajweedDetector] {
    static REGISTRY: [&'static dyn TajweedDetector; 6] = [
        &SUBSTITUTION,
        &MISSING_WORD,
        &MADD,
        &GHUNNAH,
        &QALQALAH,
        &ADJACENCY,
    ];
    &REGISTRY
}

/// Run all registered detectors and collect their errors
///
/// Detectors run concurrently; each failure is logged and skipped.
/// Under degraded alignment every confidence is multiplied by
/// `confidence_penalty` (< 1.0) instead of suppressing output, so the
/// user still receives actionable feedback. Output ordering is
/// normalized to (token_index, error_type) so the result does not
/// depend on completion order.
pub async fn run_all(ctx: &DetectorContext, confidence_penalty: f64) -> Vec<DetectedError> {
    let futures = registry().iter().map(|detector| async move {
        (detector.name(), detector.detect(ctx).await)
    });

    let results = futures::future::join_all(futures).await;

    let mut errors: Vec<DetectedError> = Vec::new();
    for (name, result) in results {
        match result {
            Ok(mut detected) => errors.append(&mut detected),
            Err(e) => {
                warn!(detector = name, "Detector skipped: {}", e);
            }
        }
    }

    if confidence_penalty < 1.0 {
        for error in &mut errors {
            error.confidence = (error.confidence * confidence_penalty).clamp(0.0, 1.0);
        }
    }

    errors.sort_by(|a, b| {
        a.token_index
            .cmp(&b.token_index)
            .then_with(|| a.error_type.as_str().cmp(b.error_type.as_str()))
    });
    errors
}

/// Estimate the time window of a letter within its token's interval,
/// proportional to its char offset. `min_width_secs` widens the window
/// for duration measurements; it is always clipped to the token end.
pub fn letter_window(
    entry: &AlignmentEntry,
    letter: &LetterAnnotation,
    min_width_secs: f64,
) -> (f64, f64) {
    let token_duration = (entry.time_end - entry.time_start).max(0.0);
    if token_duration == 0.0 || letter.char_len == 0 {
        return (entry.time_start, entry.time_end);
    }
    let ratio = letter.char_index as f64 / letter.char_len as f64;
    let start = entry.time_start + token_duration * ratio;
    let natural_width = token_duration / letter.char_len as f64;
    let end = (start + natural_width.max(min_width_secs)).min(entry.time_end.max(start));
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DecodedAudio, TARGET_SAMPLE_RATE};
    use crate::corpus::QuranCorpus;
    use crate::types::{AlignmentStatus, TranscribedWord, TranscriptionResult};

    pub(crate) fn silent_features(duration_secs: f64) -> Arc<AudioFeatures> {
        let n = (TARGET_SAMPLE_RATE as f64 * duration_secs) as usize;
        Arc::new(AudioFeatures::extract(&DecodedAudio {
            samples: vec![0.0; n],
            sample_rate: TARGET_SAMPLE_RATE,
        }))
    }

    pub(crate) fn tone_features(freq_hz: f64, duration_secs: f64) -> Arc<AudioFeatures> {
        let n = (TARGET_SAMPLE_RATE as f64 * duration_secs) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f64 / TARGET_SAMPLE_RATE as f64;
                (0.5 * (2.0 * std::f64::consts::PI * freq_hz * t).sin()) as f32
            })
            .collect();
        Arc::new(AudioFeatures::extract(&DecodedAudio {
            samples,
            sample_rate: TARGET_SAMPLE_RATE,
        }))
    }

    pub(crate) fn context_for(
        surah: u16,
        ayah: u16,
        words: &[(&str, f64, f64)],
        features: Arc<AudioFeatures>,
    ) -> DetectorContext {
        let corpus = QuranCorpus::load(None);
        let verse = corpus.get(surah, ayah).unwrap();
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
        let engine = crate::alignment::AlignmentEngine::new(crate::config::AlignmentConfig::default());
        let alignment = engine.align(&verse, &transcription);

        DetectorContext {
            verse,
            alignment: Arc::new(alignment),
            features,
            config: Arc::new(DetectorConfig::default()),
        }
    }

    #[tokio::test]
    async fn test_run_all_is_deterministic() {
        let ctx = context_for(
            1,
            1,
            &[
                ("بسم", 0.0, 0.4),
                ("الله", 0.5, 0.9),
                ("الرحمن", 1.0, 1.6),
                ("الرحيم", 1.7, 2.4),
            ],
            silent_features(2.5),
        );

        let a = run_all(&ctx, 1.0).await;
        let b = run_all(&ctx, 1.0).await;
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn test_degraded_penalty_scales_confidence() {
        let ctx = context_for(
            1,
            1,
            &[("بسم", 0.0, 0.4), ("الرحيم", 1.7, 2.4)],
            silent_features(2.5),
        );

        let full = run_all(&ctx, 1.0).await;
        let penalized = run_all(&ctx, 0.5).await;
        assert_eq!(full.len(), penalized.len());
        for (f, p) in full.iter().zip(&penalized) {
            assert!((p.confidence - f.confidence * 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_letter_window_proportional() {
        let entry = AlignmentEntry {
            canonical_token_index: 0,
            time_start: 1.0,
            time_end: 2.0,
            alignment_confidence: 1.0,
            status: AlignmentStatus::Aligned,
            transcribed_text: None,
            word_confidence: 1.0,
        };
        let letter = LetterAnnotation {
            letter: 'ا',
            char_index: 2,
            char_len: 4,
        };
        let (start, end) = letter_window(&entry, &letter, 0.1);
        assert!((start - 1.5).abs() < 1e-9);
        assert!(end > start && end <= 2.0);
    }
}
