//! Missing-word detection
//!
//! Every canonical token the alignment marked as deleted becomes one
//! error. Confidence is one minus the average alignment confidence of
//! the surrounding tokens.

use super::{DetectorContext, DetectorError, TajweedDetector};
use crate::types::{AlignmentStatus, DetectedError, ErrorType, Severity};

pub struct MissingWordDetector;

#[async_trait::async_trait]
impl TajweedDetector for MissingWordDetector {
    fn name(&self) -> &'static str {
        "missing_word"
    }

    async fn detect(&self, ctx: &DetectorContext) -> Result<Vec<DetectedError>, DetectorError> {
        let entries = &ctx.alignment.entries;
        let mut errors = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            if entry.status != AlignmentStatus::Deleted {
                continue;
            }
            let token = &ctx.verse.tokens[entry.canonical_token_index];

            let neighbors: Vec<f64> = [i.checked_sub(1), Some(i + 1)]
                .into_iter()
                .flatten()
                .filter_map(|j| entries.get(j))
                .filter(|e| e.status == AlignmentStatus::Aligned)
                .map(|e| e.alignment_confidence)
                .collect();
            let context_quality = if neighbors.is_empty() {
                0.5
            } else {
                neighbors.iter().sum::<f64>() / neighbors.len() as f64
            };

            // Anchor the missing word in time at the gap between its
            // aligned neighbors when both exist
            let start_time = entries[..i]
                .iter()
                .rev()
                .find(|e| e.status == AlignmentStatus::Aligned)
                .map(|e| e.time_end)
                .unwrap_or(0.0);
            let end_time = entries[i + 1..]
                .iter()
                .find(|e| e.status == AlignmentStatus::Aligned)
                .map(|e| e.time_start)
                .unwrap_or(start_time);

            errors.push(DetectedError {
                error_type: ErrorType::MissingWord,
                token_index: entry.canonical_token_index,
                letter: None,
                expected: token.token_text.clone(),
                detected: None,
                start_time,
                end_time: end_time.max(start_time),
                confidence: (1.0 - context_quality).clamp(0.0, 1.0),
                severity: Severity::High,
                suggestion: format!(
                    "The word '{}' was skipped. Recite the verse slowly and include every word.",
                    token.token_text
                ),
                correction_audio_id: None,
            });
        }

        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{context_for, silent_features};
    use super::*;

    #[tokio::test]
    async fn test_skipped_word_reported_once() {
        // 1:1 with الله omitted
        let ctx = context_for(
            1,
            1,
            &[("بسم", 0.0, 0.4), ("الرحمن", 0.9, 1.5), ("الرحيم", 1.6, 2.2)],
            silent_features(3.0),
        );

        let errors = MissingWordDetector.detect(&ctx).await.unwrap();
        assert_eq!(errors.len(), 1);
        let err = &errors[0];
        assert_eq!(err.error_type, ErrorType::MissingWord);
        assert_eq!(err.token_index, 1);
        assert_eq!(err.severity, Severity::High);
        // Gap sits between the neighbors that did align
        assert!(err.start_time >= 0.4 - 1e-9);
        assert!(err.end_time <= 0.9 + 1e-9);
        // Both neighbors aligned exactly (similarity 1.0), so the
        // inverted-context confidence bottoms out
        assert!(err.confidence < 1e-9);
    }

    #[tokio::test]
    async fn test_complete_recitation_no_missing_words() {
        let ctx = context_for(
            1,
            1,
            &[
                ("بسم", 0.0, 0.4),
                ("الله", 0.5, 0.9),
                ("الرحمن", 1.0, 1.6),
                ("الرحيم", 1.7, 2.3),
            ],
            silent_features(3.0),
        );

        let errors = MissingWordDetector.detect(&ctx).await.unwrap();
        assert!(errors.is_empty());
    }
}
