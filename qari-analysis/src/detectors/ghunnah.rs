//! Ghunnah (nasalization) detection
//!
//! Annotated noon/meem letters must carry nasal resonance for about two
//! counts. Presence is judged by the nasal-band energy ratio in the
//! letter's window; duration by the voiced time within it. Acoustic, so
//! it fails closed on unusable audio.

use super::{letter_window, DetectorContext, DetectorError, TajweedDetector};
use crate::types::{DetectedError, ErrorType, Severity};

pub struct GhunnahDetector;

#[async_trait::async_trait]
impl TajweedDetector for GhunnahDetector {
    fn name(&self) -> &'static str {
        "ghunnah"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError> {
        if !ctx.features_usable() {
            return Ok(Vec::new());
        }
        let cfg = &ctx.config;
        let expected = cfg.ghunnah_counts * cfg.count_unit_secs;
        let lower = expected * cfg.ghunnah_lower_tolerance;
        let mut errors = Vec::new();

        for entry in ctx.alignment.aligned() {
            let token = &ctx.verse.tokens[entry.canonical_token_index];
            for letter in &token.annotations.ghunnah {
                let (start, end) = letter_window(entry, letter, expected * 1.5);
                let nasal = ctx.features.nasal_ratio(start, end);

                if nasal < cfg.ghunnah_nasal_ratio_floor {
                    let deficit = (1.0 - nasal / cfg.ghunnah_nasal_ratio_floor).clamp(0.0, 1.0);
                    errors.push(DetectedError {
                        error_type: ErrorType::GhunnahMissing,
                        token_index: entry.canonical_token_index,
                        letter: Some(letter.letter.to_string()),
                        expected: "nasalized hold".to_string(),
                        detected: Some(format!("nasal ratio {:.2}", nasal)),
                        start_time: start,
                        end_time: end,
                        confidence: ((0.55 + 0.35 * deficit) * entry.alignment_confidence)
                            .clamp(0.0, 1.0),
                        severity: Severity::Medium,
                        suggestion: format!(
                            "Hum the '{}' through the nose for about {:.0} counts.",
                            letter.letter, cfg.ghunnah_counts
                        ),
                        correction_audio_id: Some("ghunnah_example".to_string()),
                    });
                    continue;
                }

                let voiced =
                    ctx.features
                        .voiced_duration(start, end, cfg.voiced_rel_threshold);
                if voiced < lower {
                    let margin = (1.0 - voiced / lower).clamp(0.0, 1.0);
                    errors.push(DetectedError {
                        error_type: ErrorType::GhunnahShort,
                        token_index: entry.canonical_token_index,
                        letter: Some(letter.letter.to_string()),
                        expected: format!("{:.0} counts", cfg.ghunnah_counts),
                        detected: Some(format!("{:.2}s", voiced)),
                        start_time: start,
                        end_time: end,
                        confidence: ((0.5 + 0.3 * margin) * entry.alignment_confidence)
                            .clamp(0.0, 1.0),
                        severity: Severity::Low,
                        suggestion: format!(
                            "Extend the nasal hum on '{}' to about {:.1}s.",
                            letter.letter, expected
                        ),
                        correction_audio_id: Some("ghunnah_example".to_string()),
                    });
                }
            }
        }

        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{context_for, tone_features};
    use super::*;
    use crate::audio::{DecodedAudio, TARGET_SAMPLE_RATE};
    use crate::features::AudioFeatures;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_nasal_tone_passes() {
        // 350 Hz sits in the nasal formant band; بسم ends in meem
        let ctx = context_for(1, 1, &[("بسم", 0.0, 0.6)], tone_features(350.0, 2.0));

        let errors = GhunnahDetector.detect(&ctx).await.unwrap();
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[tokio::test]
    async fn test_non_nasal_tone_raises_ghunnah_missing() {
        let ctx = context_for(1, 1, &[("بسم", 0.0, 0.6)], tone_features(1500.0, 2.0));

        let errors = GhunnahDetector.detect(&ctx).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ErrorType::GhunnahMissing);
        assert_eq!(errors[0].severity, Severity::Medium);
        assert_eq!(errors[0].token_index, 0);
    }

    #[tokio::test]
    async fn test_truncated_hum_raises_ghunnah_short() {
        // Nasal tone that dies 0.45s in, while the meem window runs to
        // 0.6s
        let total = (TARGET_SAMPLE_RATE as f64 * 2.0) as usize;
        let voiced_until = (TARGET_SAMPLE_RATE as f64 * 0.45) as usize;
        let samples: Vec<f32> = (0..total)
            .map(|i| {
                if i < voiced_until {
                    let t = i as f64 / TARGET_SAMPLE_RATE as f64;
                    (0.5 * (2.0 * std::f64::consts::PI * 350.0 * t).sin()) as f32
                } else {
                    0.0
                }
            })
            .collect();
        let features = Arc::new(AudioFeatures::extract(&DecodedAudio {
            samples,
            sample_rate: TARGET_SAMPLE_RATE,
        }));
        let ctx = context_for(1, 1, &[("بسم", 0.0, 0.6)], features);

        let errors = GhunnahDetector.detect(&ctx).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, ErrorType::GhunnahShort);
        assert_eq!(errors[0].severity, Severity::Low);
    }
}
