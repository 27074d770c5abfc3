//! Scoring and practice recommendation
//!
//! The overall score starts at 1.0 and loses a per-severity weight for
//! each detected error, floored at zero. The recommendation pairs a
//! score band with the practice areas contributing the most severity.

use std::collections::HashMap;

use crate::config::ScoringConfig;
use crate::types::{DetectedError, Severity};

pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Overall score in [0, 1]
    pub fn score(&self, errors: &[DetectedError]) -> f64 {
        let deduction: f64 = errors.iter().map(|e| self.weight(e.severity)).sum();
        (1.0 - deduction).clamp(0.0, 1.0)
    }

    fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.config.high_weight,
            Severity::Medium => self.config.medium_weight,
            Severity::Low => self.config.low_weight,
        }
    }

    /// Practice recommendation text for a scored recitation
    pub fn recommendation(&self, score: f64, errors: &[DetectedError]) -> String {
        let opening = if errors.is_empty() || score >= 0.95 {
            "Excellent recitation."
        } else if score >= 0.8 {
            "Good recitation with minor issues."
        } else if score >= 0.6 {
            "A solid attempt; several rules need attention."
        } else {
            "This recitation needs focused practice."
        };

        let areas = self.top_focus_areas(errors, 3);
        if areas.is_empty() {
            return opening.to_string();
        }
        format!("{} Focus on: {}.", opening, areas.join(", "))
    }

    /// Focus areas ranked by total severity contribution, ties broken
    /// by the stable area name so the output is deterministic
    fn top_focus_areas(&self, errors: &[DetectedError], limit: usize) -> Vec<&'static str> {
        let mut contributions: HashMap<&'static str, f64> = HashMap::new();
        for error in errors {
            *contributions
                .entry(error.error_type.focus_area())
                .or_insert(0.0) += self.weight(error.severity);
        }
        let mut areas: Vec<(&'static str, f64)> = contributions.into_iter().collect();
        areas.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        areas.into_iter().take(limit).map(|(area, _)| area).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorType;

    fn error(error_type: ErrorType, severity: Severity) -> DetectedError {
        DetectedError {
            error_type,
            token_index: 0,
            letter: None,
            expected: String::new(),
            detected: None,
            start_time: 0.0,
            end_time: 0.0,
            confidence: 0.8,
            severity,
            suggestion: String::new(),
            correction_audio_id: None,
        }
    }

    #[test]
    fn test_clean_recitation_scores_one() {
        let scorer = Scorer::new(ScoringConfig::default());
        assert_eq!(scorer.score(&[]), 1.0);
        assert_eq!(scorer.recommendation(1.0, &[]), "Excellent recitation.");
    }

    #[test]
    fn test_severity_weights_deduct() {
        let scorer = Scorer::new(ScoringConfig::default());
        let errors = vec![
            error(ErrorType::SubstitutedLetter, Severity::High),
            error(ErrorType::MaddShort, Severity::Medium),
            error(ErrorType::MaddLong, Severity::Low),
        ];
        // 1.0 - 0.15 - 0.08 - 0.03
        assert!((scorer.score(&errors) - 0.74).abs() < 1e-9);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let scorer = Scorer::new(ScoringConfig::default());
        let errors: Vec<_> = (0..10)
            .map(|_| error(ErrorType::MissingWord, Severity::High))
            .collect();
        assert_eq!(scorer.score(&errors), 0.0);
    }

    #[test]
    fn test_recommendation_names_dominant_areas() {
        let scorer = Scorer::new(ScoringConfig::default());
        let errors = vec![
            error(ErrorType::MaddShort, Severity::Medium),
            error(ErrorType::MaddShort, Severity::Medium),
            error(ErrorType::GhunnahMissing, Severity::Medium),
        ];
        let rec = scorer.recommendation(scorer.score(&errors), &errors);
        assert!(rec.contains("elongation (madd)"));
        assert!(rec.contains("nasalization (ghunnah)"));
    }

    #[test]
    fn test_focus_areas_capped_and_deterministic() {
        let scorer = Scorer::new(ScoringConfig::default());
        let errors = vec![
            error(ErrorType::MaddShort, Severity::Low),
            error(ErrorType::GhunnahShort, Severity::Low),
            error(ErrorType::QalqalahWeak, Severity::Low),
            error(ErrorType::IkhfaMissing, Severity::Medium),
        ];
        let areas = scorer.top_focus_areas(&errors, 3);
        assert_eq!(areas.len(), 3);
        // Highest severity contribution first, then alphabetical
        assert_eq!(areas[0], "concealment (ikhfa)");
    }

    #[test]
    fn test_focus_areas_rank_by_severity_not_count() {
        let scorer = Scorer::new(ScoringConfig::default());
        // Two low-weight madd errors (0.06 total) against one high-weight
        // omission (0.15): the omission dominates despite fewer occurrences
        let errors = vec![
            error(ErrorType::MaddShort, Severity::Low),
            error(ErrorType::MaddLong, Severity::Low),
            error(ErrorType::MissingWord, Severity::High),
        ];
        let areas = scorer.top_focus_areas(&errors, 3);
        assert_eq!(areas[0], ErrorType::MissingWord.focus_area());
        assert_eq!(areas[1], "elongation (madd)");
    }
}
