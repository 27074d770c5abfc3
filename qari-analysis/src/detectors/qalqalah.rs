//! Qalqalah (echoing bounce) detection
//!
//! Qalqalah letters carried at a stop must release with a short energy
//! burst. The peak/mean RMS ratio over the letter's window is the burst
//! measure; a present but faint bounce is flagged separately from an
//! absent one. Acoustic, so it fails closed on unusable audio.

use super::{letter_window, DetectorContext, DetectorError, TajweedDetector};
use crate::types::{DetectedError, ErrorType, Severity};

pub struct QalqalahDetector;

#[async_trait::async_trait]
impl TajweedDetector for QalqalahDetector {
    fn name(&self) -> &'static str {
        "qalqalah"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError> {
        if !ctx.features_usable() {
            return Ok(Vec::new());
        }
        let cfg = &ctx.config;
        let mut errors = Vec::new();

        for entry in ctx.alignment.aligned() {
            let token = &ctx.verse.tokens[entry.canonical_token_index];
            for letter in &token.annotations.qalqalah {
                let (start, end) = letter_window(entry, letter, cfg.qalqalah_window_floor_secs);
                let (peak, _) = ctx.features.peak_mean_rms(start, end);
                let burst = ctx.features.burst_ratio(start, end);

                if burst < cfg.qalqalah_burst_ratio_floor {
                    let deficit =
                        (1.0 - burst / cfg.qalqalah_burst_ratio_floor).clamp(0.0, 1.0);
                    errors.push(DetectedError {
                        error_type: ErrorType::QalqalahMissing,
                        token_index: entry.canonical_token_index,
                        letter: Some(letter.letter.to_string()),
                        expected: "echoing release".to_string(),
                        detected: Some(format!("burst ratio {:.2}", burst)),
                        start_time: start,
                        end_time: end,
                        confidence: ((0.55 + 0.35 * deficit) * entry.alignment_confidence)
                            .clamp(0.0, 1.0),
                        severity: Severity::Medium,
                        suggestion: format!(
                            "Release the '{}' with a short bounce of sound at the stop.",
                            letter.letter
                        ),
                        correction_audio_id: Some("qalqalah_example".to_string()),
                    });
                } else if peak < cfg.qalqalah_energy_floor {
                    errors.push(DetectedError {
                        error_type: ErrorType::QalqalahWeak,
                        token_index: entry.canonical_token_index,
                        letter: Some(letter.letter.to_string()),
                        expected: "clearly audible release".to_string(),
                        detected: Some(format!("peak level {:.3}", peak)),
                        start_time: start,
                        end_time: end,
                        confidence: (0.45 + 0.3 * entry.alignment_confidence).clamp(0.0, 1.0),
                        severity: Severity::Low,
                        suggestion: format!(
                            "The bounce on '{}' is present but too faint; release it with more energy.",
                            letter.letter
                        ),
                        correction_audio_id: Some("qalqalah_example".to_string()),
                    });
                }
            }
        }

        Ok(errors)
    }
}
