//! Madd (elongation) duration checking
//!
//! Each annotated madd letter has a prescribed count; one count is a
//! configurable slice of a second. The voiced duration inside the
//! letter's window is compared against the prescribed duration with a
//! tolerance band on each side. Acoustic, so it fails closed on
//! unusable audio.

use super::{letter_window, DetectorContext, DetectorError, TajweedDetector};
use crate::types::{DetectedError, ErrorType, Severity};

pub struct MaddDetector;

#[async_trait::async_trait]
impl TajweedDetector for MaddDetector {
    fn name(&self) -> &'static str {
        "madd"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError> {
        if !ctx.features_usable() {
            return Ok(Vec::new());
        }
        let cfg = &ctx.config;
        let mut errors = Vec::new();

        for entry in ctx.alignment.aligned() {
            let token = &ctx.verse.tokens[entry.canonical_token_index];
            for (letter, kind) in &token.annotations.madd {
                let expected = kind.expected_counts() * cfg.count_unit_secs;
                let lower = expected * cfg.madd_lower_tolerance;
                let upper = expected * cfg.madd_upper_tolerance;
                // Measure past the acceptable maximum so over-elongation
                // is observable at all
                let window_floor = upper + 2.0 * cfg.count_unit_secs;
                let (start, end) = letter_window(entry, letter, window_floor);
                let voiced =
                    ctx.features
                        .voiced_duration(start, end, cfg.voiced_rel_threshold);

                if voiced < lower {
                    let margin = (1.0 - voiced / lower).clamp(0.0, 1.0);
                    errors.push(DetectedError {
                        error_type: ErrorType::MaddShort,
                        token_index: entry.canonical_token_index,
                        letter: Some(letter.letter.to_string()),
                        expected: format!("{:.0} counts", kind.expected_counts()),
                        detected: Some(format!("{:.2}s", voiced)),
                        start_time: start,
                        end_time: end,
                        confidence: ((0.55 + 0.35 * margin) * entry.alignment_confidence)
                            .clamp(0.0, 1.0),
                        severity: Severity::Medium,
                        suggestion: format!(
                            "Hold the elongation on '{}' for {:.0} counts (about {:.1}s).",
                            letter.letter,
                            kind.expected_counts(),
                            expected
                        ),
                        correction_audio_id: Some("madd_example".to_string()),
                    });
                } else if voiced > upper {
                    let margin = (voiced / upper - 1.0).clamp(0.0, 1.0);
                    errors.push(DetectedError {
                        error_type: ErrorType::MaddLong,
                        token_index: entry.canonical_token_index,
                        letter: Some(letter.letter.to_string()),
                        expected: format!("{:.0} counts", kind.expected_counts()),
                        detected: Some(format!("{:.2}s", voiced)),
                        start_time: start,
                        end_time: end,
                        confidence: ((0.5 + 0.3 * margin) * entry.alignment_confidence)
                            .clamp(0.0, 1.0),
                        severity: Severity::Low,
                        suggestion: format!(
                            "The elongation on '{}' ran long; {:.0} counts is enough.",
                            letter.letter,
                            kind.expected_counts()
                        ),
                        correction_audio_id: Some("madd_example".to_string()),
                    });
                }
            }
        }

        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{context_for, silent_features, tone_features};
    use super::*;
    use crate::audio::{DecodedAudio, TARGET_SAMPLE_RATE};
    use crate::features::AudioFeatures;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_truncated_madd_raises_one_madd_short() {
        // 0.05s of voicing against a 2-count expectation (~0.24s at the
        // default count unit) is unambiguously short
        let ctx = context_for(
            1,
            1,
            &[
                ("بسم", 0.0, 0.4),
                ("الله", 0.5, 0.55),
                ("الرحمن", 1.0, 1.6),
                ("الرحيم", 1.7, 2.4),
            ],
            silent_features(3.0),
        );

        let errors = MaddDetector.detect(&ctx).await.unwrap();
        let at_token: Vec<_> = errors
            .iter()
            .filter(|e| e.token_index == 1 && e.error_type == ErrorType::MaddShort)
            .collect();
        assert_eq!(at_token.len(), 1);
        assert_eq!(at_token[0].severity, Severity::Medium);
        assert!(at_token[0].confidence > 0.5);
    }

    #[tokio::test]
    async fn test_well_held_madd_passes() {
        // Continuous voicing over a 0.4s token satisfies the 2-count
        // band (0.144s..0.432s at defaults)
        let ctx = context_for(1, 1, &[("الله", 0.5, 0.9)], tone_features(220.0, 3.0));

        let errors = MaddDetector.detect(&ctx).await.unwrap();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[tokio::test]
    async fn test_over_held_madd_raises_madd_long() {
        let ctx = context_for(1, 1, &[("الله", 0.5, 1.6)], tone_features(220.0, 3.0));

        let errors = MaddDetector.detect(&ctx).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ErrorType::MaddLong);
        assert_eq!(errors[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_clipped_audio_fails_closed() {
        let n = (TARGET_SAMPLE_RATE as f64 * 3.0) as usize;
        let clipped = Arc::new(AudioFeatures::extract(&DecodedAudio {
            samples: vec![1.0; n],
            sample_rate: TARGET_SAMPLE_RATE,
        }));
        let ctx = context_for(1, 1, &[("الله", 0.5, 0.55)], clipped);

        let errors = MaddDetector.detect(&ctx).await.unwrap();
        assert!(errors.is_empty());
    }
}
