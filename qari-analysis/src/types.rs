//! Core data model for the recitation analysis pipeline
//!
//! The pipeline transforms a transcription plus decoded audio into an
//! `AnalysisResult`: verse match -> time alignment -> tajweed detectors
//! -> score -> review routing. All of these types are immutable once
//! created; one set per request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single transcribed word with its time interval
///
/// Produced by the external ASR collaborator; the pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribedWord {
    pub word_text: String,
    /// Start time in seconds from the beginning of the recording
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// ASR confidence for this word (0.0-1.0)
    #[serde(default = "default_word_confidence")]
    pub word_confidence: f64,
}

fn default_word_confidence() -> f64 {
    1.0
}

/// Full ASR output for one recording
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub words: Vec<TranscribedWord>,
}

impl TranscriptionResult {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.text.trim().is_empty()
    }
}

/// Best verse match with its similarity-derived confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub surah: u16,
    pub ayah: u16,
    /// Similarity score in [0, 1]
    pub confidence: f64,
    /// Canonical verse text (with diacritics)
    pub text: String,
    /// How the match was found
    pub match_type: MatchType,
}

/// How the verse matcher arrived at its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Caller-supplied (surah, ayah) hint confirmed by similarity
    HintConfirmed,
    /// Full corpus search
    Search,
}

/// Alignment status of one canonical token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    /// Token matched a transcribed word and carries its time interval
    Aligned,
    /// Transcribed word with no canonical counterpart (diagnostic only)
    Inserted,
    /// Canonical token with no transcribed counterpart; excluded from
    /// time-dependent rule checks
    Deleted,
}

/// One entry of the alignment map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentEntry {
    /// Index into the canonical token sequence
    pub canonical_token_index: usize,
    pub time_start: f64,
    pub time_end: f64,
    /// Grapheme-similarity confidence of the match (0.0-1.0)
    pub alignment_confidence: f64,
    pub status: AlignmentStatus,
    /// Transcribed text matched to this token, when aligned
    pub transcribed_text: Option<String>,
    /// ASR word confidence inherited from the transcribed word
    pub word_confidence: f64,
}

/// Time alignment of canonical tokens onto the recording
///
/// Invariant: every canonical token index 0..N-1 appears exactly once in
/// `entries` (status aligned or deleted), and aligned entries are in
/// increasing time order. Transcribed words with no canonical
/// counterpart are kept separately in `insertions` for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentMap {
    pub entries: Vec<AlignmentEntry>,
    pub insertions: Vec<AlignmentEntry>,
}

impl AlignmentMap {
    /// Aligned entries in canonical order
    pub fn aligned(&self) -> impl Iterator<Item = &AlignmentEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == AlignmentStatus::Aligned)
    }

    /// Canonical tokens with no transcribed counterpart
    pub fn deleted(&self) -> impl Iterator<Item = &AlignmentEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == AlignmentStatus::Deleted)
    }

    /// Fraction of canonical tokens that are deleted or shadowed by
    /// insertions; drives the degraded-alignment confidence penalty
    pub fn degradation_ratio(&self) -> f64 {
        if self.entries.is_empty() {
            return 1.0;
        }
        let deleted = self.deleted().count();
        let total = self.entries.len();
        (deleted + self.insertions.len()) as f64 / total as f64
    }
}

/// Closed set of detectable tajweed error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    SubstitutedLetter,
    MissingWord,
    MaddShort,
    MaddLong,
    GhunnahMissing,
    GhunnahShort,
    QalqalahMissing,
    QalqalahWeak,
    IdghamMissing,
    IkhfaMissing,
    IqlabMissing,
}

impl ErrorType {
    /// All error types, in a stable order
    pub const ALL: [ErrorType; 11] = [
        ErrorType::SubstitutedLetter,
        ErrorType::MissingWord,
        ErrorType::MaddShort,
        ErrorType::MaddLong,
        ErrorType::GhunnahMissing,
        ErrorType::GhunnahShort,
        ErrorType::QalqalahMissing,
        ErrorType::QalqalahWeak,
        ErrorType::IdghamMissing,
        ErrorType::IkhfaMissing,
        ErrorType::IqlabMissing,
    ];

    /// Wire name (matches the serde snake_case rename)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::SubstitutedLetter => "substituted_letter",
            ErrorType::MissingWord => "missing_word",
            ErrorType::MaddShort => "madd_short",
            ErrorType::MaddLong => "madd_long",
            ErrorType::GhunnahMissing => "ghunnah_missing",
            ErrorType::GhunnahShort => "ghunnah_short",
            ErrorType::QalqalahMissing => "qalqalah_missing",
            ErrorType::QalqalahWeak => "qalqalah_weak",
            ErrorType::IdghamMissing => "idgham_missing",
            ErrorType::IkhfaMissing => "ikhfa_missing",
            ErrorType::IqlabMissing => "iqlab_missing",
        }
    }

    /// Parse a wire name back into the enum
    pub fn parse(s: &str) -> Option<ErrorType> {
        ErrorType::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Human-readable practice area, used by the recommender
    pub fn focus_area(&self) -> &'static str {
        match self {
            ErrorType::SubstitutedLetter => "letter pronunciation",
            ErrorType::MissingWord => "complete recitation",
            ErrorType::MaddShort | ErrorType::MaddLong => "elongation (madd)",
            ErrorType::GhunnahMissing | ErrorType::GhunnahShort => "nasalization (ghunnah)",
            ErrorType::QalqalahMissing | ErrorType::QalqalahWeak => "qalqalah bounce",
            ErrorType::IdghamMissing => "assimilation (idgham)",
            ErrorType::IkhfaMissing => "concealment (ikhfa)",
            ErrorType::IqlabMissing => "substitution (iqlab)",
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A detected tajweed error, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedError {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Canonical token index the error is anchored to
    pub token_index: usize,
    /// The letter the error concerns, when letter-scoped
    pub letter: Option<String>,
    pub expected: String,
    pub detected: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    /// Detector confidence (0.0-1.0)
    pub confidence: f64,
    pub severity: Severity,
    pub suggestion: String,
    /// Identifier resolvable via GET /api/v1/correction/audio/{id}
    pub correction_audio_id: Option<String>,
}

/// Terminal artifact of one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub request_id: Uuid,
    /// `None` when the matcher confidence stayed below the floor
    pub matched_ayah: Option<MatchResult>,
    pub errors: Vec<DetectedError>,
    /// Overall score in [0, 1]
    pub overall_score: f64,
    pub recommendation: String,
    /// Whether the review router auto-accepted the result
    pub auto_accepted: bool,
    pub processing_time_ms: u64,
}

/// Review routing decision for one analysis request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Every error confidence met its per-type threshold
    AutoAccepted,
    /// Sub-threshold errors were queued for human adjudication
    Queued {
        priority: i64,
        low_confidence_errors: Vec<DetectedError>,
    },
}

/// A queued recording awaiting human review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub recording_id: Uuid,
    pub user_id: String,
    pub surah: u16,
    pub ayah: u16,
    pub low_confidence_errors: Vec<DetectedError>,
    pub priority: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One reviewer verdict over one detected error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorVerdict {
    /// Index into the recording's detected error list
    pub error_index: usize,
    /// Whether the detection was correct
    pub is_correct: bool,
    /// Reclassification when the type was wrong
    pub actual_error_type: Option<String>,
    pub notes: Option<String>,
}

/// Human review closing a ReviewItem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanReview {
    pub recording_id: Uuid,
    pub reviewer_id: String,
    pub verdicts: Vec<ErrorVerdict>,
    pub overall_assessment: String,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_wire_names_round_trip() {
        for t in ErrorType::ALL {
            assert_eq!(ErrorType::parse(t.as_str()), Some(t));
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_degradation_ratio_empty_map() {
        let map = AlignmentMap {
            entries: vec![],
            insertions: vec![],
        };
        assert_eq!(map.degradation_ratio(), 1.0);
    }
}
