//! Verse matcher
//!
//! Maps a noisy transcription to the single best canonical verse.
//! Scoring runs over the normalized consonantal skeleton so ASR
//! diacritic noise does not dominate the metric.

use crate::corpus::{arabic, QuranCorpus, VerseReference};
use crate::types::{MatchResult, MatchType};
use std::sync::Arc;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

/// Matcher configuration view (floors come from `AnalysisConfig`)
pub use crate::config::MatcherConfig;

/// Outcome of verse matching
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Best verse at or above the floor
    Matched {
        verse: Arc<VerseReference>,
        result: MatchResult,
    },
    /// Best score stayed below the absolute floor; the pipeline must not
    /// proceed to alignment
    NoMatch { best_score: f64 },
}

pub struct VerseMatcher {
    corpus: Arc<QuranCorpus>,
    config: MatcherConfig,
}

impl VerseMatcher {
    pub fn new(corpus: Arc<QuranCorpus>, config: MatcherConfig) -> Self {
        Self { corpus, config }
    }

    /// Match a transcription against the corpus
    ///
    /// A (surah, ayah) hint short-circuits the search when its canonical
    /// text is similar enough to the transcription; otherwise every
    /// candidate verse is scored and the arg-max returned. Ties within
    /// `tie_epsilon` prefer the verse with fewer tokens.
    pub fn match_verse(&self, transcription: &str, hint: Option<(u16, u16)>) -> MatchOutcome {
        let normalized = arabic::normalize(transcription);

        if normalized.is_empty() {
            return MatchOutcome::NoMatch { best_score: 0.0 };
        }

        if let Some((surah, ayah)) = hint {
            if let Some(verse) = self.corpus.get(surah, ayah) {
                let score = normalized_levenshtein(&normalized, &verse.normalized_text);
                if score >= self.config.hint_floor {
                    debug!(surah, ayah, score, "Hint verse confirmed");
                    return self.matched(verse, score, MatchType::HintConfirmed);
                }
                debug!(
                    surah,
                    ayah, score, "Hint verse below similarity floor, searching corpus"
                );
            } else {
                debug!(surah, ayah, "Hint verse not in corpus, searching");
            }
        }

        self.search(&normalized)
    }

    fn search(&self, normalized: &str) -> MatchOutcome {
        let mut best: Option<(&Arc<VerseReference>, f64)> = None;

        for verse in self.corpus.verses() {
            let score = normalized_levenshtein(normalized, &verse.normalized_text);
            best = match best {
                None => Some((verse, score)),
                Some((cur_verse, cur_score)) => {
                    if score > cur_score + self.config.tie_epsilon {
                        Some((verse, score))
                    } else if (score - cur_score).abs() <= self.config.tie_epsilon
                        && verse.token_count() < cur_verse.token_count()
                    {
                        // Shorter, more specific match wins a tie
                        Some((verse, score.max(cur_score)))
                    } else {
                        Some((cur_verse, cur_score))
                    }
                }
            };
        }

        match best {
            Some((verse, score)) if score >= self.config.no_match_floor => {
                info!(
                    surah = verse.surah,
                    ayah = verse.ayah,
                    confidence = score,
                    "Best corpus match"
                );
                self.matched(Arc::clone(verse), score, MatchType::Search)
            }
            Some((_, score)) => {
                info!(best_score = score, "No verse above match floor");
                MatchOutcome::NoMatch { best_score: score }
            }
            None => MatchOutcome::NoMatch { best_score: 0.0 },
        }
    }

    fn matched(&self, verse: Arc<VerseReference>, score: f64, match_type: MatchType) -> MatchOutcome {
        let result = MatchResult {
            surah: verse.surah,
            ayah: verse.ayah,
            confidence: score,
            text: verse.canonical_text.clone(),
            match_type,
        };
        MatchOutcome::Matched { verse, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;

    fn matcher() -> VerseMatcher {
        VerseMatcher::new(QuranCorpus::load(None), MatcherConfig::default())
    }

    #[test]
    fn test_exact_transcription_matches_with_high_confidence() {
        let m = matcher();
        match m.match_verse("بسم الله الرحمن الرحيم", None) {
            MatchOutcome::Matched { result, .. } => {
                assert_eq!((result.surah, result.ayah), (1, 1));
                assert!(result.confidence > 0.9);
            }
            MatchOutcome::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn test_diacritized_transcription_matches() {
        let m = matcher();
        match m.match_verse("قُلْ هُوَ اللَّهُ أَحَدٌ", None) {
            MatchOutcome::Matched { result, .. } => {
                assert_eq!((result.surah, result.ayah), (112, 1));
                assert!(result.confidence >= 0.95);
            }
            MatchOutcome::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn test_hint_confirmed_without_search() {
        let m = matcher();
        match m.match_verse("الحمد لله رب العالمين", Some((1, 2))) {
            MatchOutcome::Matched { result, .. } => {
                assert_eq!(result.match_type, MatchType::HintConfirmed);
                assert_eq!((result.surah, result.ayah), (1, 2));
            }
            MatchOutcome::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn test_wrong_hint_falls_back_to_search() {
        let m = matcher();
        // Transcription is 112:1 but the hint claims 1:4
        match m.match_verse("قل هو الله احد", Some((1, 4))) {
            MatchOutcome::Matched { result, .. } => {
                assert_eq!(result.match_type, MatchType::Search);
                assert_eq!((result.surah, result.ayah), (112, 1));
            }
            MatchOutcome::NoMatch { .. } => panic!("expected a match"),
        }
    }

    #[test]
    fn test_gibberish_yields_no_match() {
        let m = matcher();
        match m.match_verse("zzz qqq xxx www", None) {
            MatchOutcome::NoMatch { best_score } => assert!(best_score < 0.35),
            MatchOutcome::Matched { result, .. } => {
                panic!("unexpected match with confidence {}", result.confidence)
            }
        }
    }

    #[test]
    fn test_empty_transcription_is_no_match() {
        let m = matcher();
        assert!(matches!(
            m.match_verse("   ", None),
            MatchOutcome::NoMatch { .. }
        ));
    }

    #[test]
    fn test_substring_prefers_shorter_verse() {
        let m = matcher();
        // "الرحمن الرحيم" is exactly 1:3 and a suffix of 1:1
        match m.match_verse("الرحمن الرحيم", None) {
            MatchOutcome::Matched { result, .. } => {
                assert_eq!((result.surah, result.ayah), (1, 3));
            }
            MatchOutcome::NoMatch { .. } => panic!("expected a match"),
        }
    }
}
