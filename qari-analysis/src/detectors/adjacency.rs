//! Noon-sakin/tanween adjacency rules (idgham, ikhfa, iqlab)
//!
//! All three rules require nasal carry-over at the junction between the
//! trigger token and its follower; the specific rule only changes which
//! error is reported and what the suggestion says. The measure is the
//! nasal-band ratio over a window straddling the word boundary.
//! Acoustic, so it fails closed on unusable audio.

use super::{DetectorContext, DetectorError, TajweedDetector};
use crate::corpus::annotations::AdjacencyRule;
use crate::types::{AlignmentStatus, DetectedError, ErrorType, Severity};

pub struct AdjacencyDetector;

#[async_trait::async_trait]
impl TajweedDetector for AdjacencyDetector {
    fn name(&self) -> &'static str {
        "adjacency"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError> {
        if !ctx.features_usable() {
            return Ok(Vec::new());
        }
        let cfg = &ctx.config;
        let entries = &ctx.alignment.entries;
        let mut errors = Vec::new();

        for pair in entries.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            if current.status != AlignmentStatus::Aligned
                || next.status != AlignmentStatus::Aligned
            {
                continue;
            }
            let token = &ctx.verse.tokens[current.canonical_token_index];
            let Some(rule) = token.annotations.adjacency else {
                continue;
            };

            let start = (current.time_end - cfg.junction_half_width_secs).max(current.time_start);
            let end = (next.time_start + cfg.junction_half_width_secs).min(next.time_end);
            if end <= start {
                continue;
            }
            let nasal = ctx.features.nasal_ratio(start, end);
            if nasal >= cfg.junction_nasal_ratio_floor {
                continue;
            }

            let next_token = &ctx.verse.tokens[next.canonical_token_index];
            let (error_type, suggestion) = match rule {
                AdjacencyRule::Idgham => (
                    ErrorType::IdghamMissing,
                    format!(
                        "Merge the noon sound into '{}' with a nasal hum instead of \
                         pronouncing it separately.",
                        next_token.token_text
                    ),
                ),
                AdjacencyRule::Ikhfa => (
                    ErrorType::IkhfaMissing,
                    format!(
                        "Conceal the noon before '{}': hold a light nasal hum without \
                         touching the tongue to the ridge.",
                        next_token.token_text
                    ),
                ),
                AdjacencyRule::Iqlab => (
                    ErrorType::IqlabMissing,
                    format!(
                        "Turn the noon into a hidden meem before '{}', humming through \
                         the nose.",
                        next_token.token_text
                    ),
                ),
            };

            let deficit = (1.0 - nasal / cfg.junction_nasal_ratio_floor).clamp(0.0, 1.0);
            let pair_confidence =
                (current.alignment_confidence + next.alignment_confidence) / 2.0;
            errors.push(DetectedError {
                error_type,
                token_index: current.canonical_token_index,
                letter: Some('ن'.to_string()),
                expected: "nasal carry-over at the word boundary".to_string(),
                detected: Some(format!("nasal ratio {:.2}", nasal)),
                start_time: start,
                end_time: end,
                confidence: ((0.5 + 0.35 * deficit) * pair_confidence).clamp(0.0, 1.0),
                severity: Severity::Medium,
                suggestion,
                correction_audio_id: Some("ghunnah_example".to_string()),
            });
        }

        Ok(errors)
    }
}
