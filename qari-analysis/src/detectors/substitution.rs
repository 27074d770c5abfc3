//! Substituted-letter detection
//!
//! Compares each aligned token's canonical letters against the
//! transcribed word, letter by letter over the base (non-diacritic)
//! characters. An error is only raised for known confusable pairs;
//! arbitrary ASR noise is not a pronunciation error.

use super::{DetectorContext, DetectorError, TajweedDetector};
use crate::corpus::arabic;
use crate::types::{DetectedError, ErrorType, Severity};

pub struct SubstitutionDetector;

#[async_trait::async_trait]
impl TajweedDetector for SubstitutionDetector {
    fn name(&self) -> &'static str {
        "substitution"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError> {
        let mut errors = Vec::new();

        for entry in ctx.alignment.aligned() {
            let token = &ctx.verse.tokens[entry.canonical_token_index];
            let Some(transcribed) = entry.transcribed_text.as_deref() else {
                continue;
            };

            // Compare in normalized space so alef/yeh variants do not
            // masquerade as pronunciation errors
            let expected_letters = arabic::base_letters(&token.normalized);
            let detected = arabic::normalize(transcribed);
            let detected_letters = arabic::base_letters(&detected);

            for ((_, expected), (_, detected)) in expected_letters.iter().zip(&detected_letters) {
                if expected == detected {
                    continue;
                }
                if !arabic::confusable_with(*expected).contains(detected) {
                    continue;
                }

                let tip = arabic::letter_tip(*expected);
                // Classifier margin proxy: how confidently the ASR heard
                // the substituted word, damped by alignment quality
                let confidence =
                    (0.75 * entry.word_confidence * entry.alignment_confidence.max(0.5))
                        .clamp(0.0, 1.0);

                errors.push(DetectedError {
                    error_type: ErrorType::SubstitutedLetter,
                    token_index: entry.canonical_token_index,
                    letter: Some(expected.to_string()),
                    expected: expected.to_string(),
                    detected: Some(detected.to_string()),
                    start_time: entry.time_start,
                    end_time: entry.time_end,
                    confidence,
                    severity: Severity::High,
                    suggestion: format!(
                        "The letter '{}' was pronounced as '{}'. {}",
                        expected, detected, tip
                    ),
                    correction_audio_id: arabic::correction_audio_id(*expected)
                        .map(str::to_string),
                });
            }
        }

        Ok(errors)
    }
}
