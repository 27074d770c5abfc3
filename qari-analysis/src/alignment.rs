//! Alignment engine
//!
//! Maps each canonical token onto a time interval in the recording via
//! a minimum-cost edit-distance dynamic program over token sequences.
//! Substitution cost is grapheme-similarity based; insertion/deletion
//! cost is fixed. Canonical tokens with no transcribed counterpart are
//! marked deleted; transcribed words with no canonical counterpart are
//! kept aside as insertions.

use crate::config::AlignmentConfig;
use crate::corpus::{arabic, VerseReference};
use crate::types::{AlignmentEntry, AlignmentMap, AlignmentStatus, TranscriptionResult};
use strsim::normalized_levenshtein;
use tracing::debug;

pub struct AlignmentEngine {
    config: AlignmentConfig,
}

#[derive(Clone, Copy, PartialEq)]
enum Step {
    Start,
    /// Canonical token i matched transcribed word j
    Align,
    /// Canonical token consumed with no word (deletion)
    Delete,
    /// Transcribed word consumed with no token (insertion)
    Insert,
}

impl AlignmentEngine {
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    /// Align canonical tokens to transcribed words
    ///
    /// Output invariant: every canonical token index appears exactly
    /// once in `entries`, and aligned entries are monotonically
    /// increasing in time. ASR output violating temporal order keeps its
    /// most confident contiguous monotonic run; the rest is demoted to
    /// deleted.
    pub fn align(&self, verse: &VerseReference, transcription: &TranscriptionResult) -> AlignmentMap {
        let canonical: Vec<&str> = verse.tokens.iter().map(|t| t.normalized.as_str()).collect();
        let words: Vec<String> = transcription
            .words
            .iter()
            .map(|w| arabic::normalize(&w.word_text))
            .collect();

        let n = canonical.len();
        let m = words.len();

        // cost[i][j]: min cost aligning first i canonical tokens with
        // first j transcribed words
        let mut cost = vec![vec![0.0f64; m + 1]; n + 1];
        let mut step = vec![vec![Step::Start; m + 1]; n + 1];

        for i in 1..=n {
            cost[i][0] = i as f64 * self.config.indel_cost;
            step[i][0] = Step::Delete;
        }
        for j in 1..=m {
            cost[0][j] = j as f64 * self.config.indel_cost;
            step[0][j] = Step::Insert;
        }

        for i in 1..=n {
            for j in 1..=m {
                let sim = normalized_levenshtein(canonical[i - 1], &words[j - 1]);
                let align_cost = cost[i - 1][j - 1] + (1.0 - sim);
                let delete_cost = cost[i - 1][j] + self.config.indel_cost;
                let insert_cost = cost[i][j - 1] + self.config.indel_cost;

                if align_cost <= delete_cost && align_cost <= insert_cost {
                    cost[i][j] = align_cost;
                    step[i][j] = Step::Align;
                } else if delete_cost <= insert_cost {
                    cost[i][j] = delete_cost;
                    step[i][j] = Step::Delete;
                } else {
                    cost[i][j] = insert_cost;
                    step[i][j] = Step::Insert;
                }
            }
        }

        // Traceback
        let mut entries: Vec<AlignmentEntry> = Vec::with_capacity(n);
        let mut insertions: Vec<AlignmentEntry> = Vec::new();
        let (mut i, mut j) = (n, m);

        while i > 0 || j > 0 {
            match step[i][j] {
                Step::Align => {
                    let word = &transcription.words[j - 1];
                    let sim = normalized_levenshtein(canonical[i - 1], &words[j - 1]);
                    entries.push(AlignmentEntry {
                        canonical_token_index: i - 1,
                        time_start: word.start_time,
                        time_end: word.end_time,
                        alignment_confidence: sim,
                        status: AlignmentStatus::Aligned,
                        transcribed_text: Some(word.word_text.clone()),
                        word_confidence: word.word_confidence,
                    });
                    i -= 1;
                    j -= 1;
                }
                Step::Delete => {
                    entries.push(AlignmentEntry {
                        canonical_token_index: i - 1,
                        time_start: 0.0,
                        time_end: 0.0,
                        alignment_confidence: 0.0,
                        status: AlignmentStatus::Deleted,
                        transcribed_text: None,
                        word_confidence: 0.0,
                    });
                    i -= 1;
                }
                Step::Insert => {
                    let word = &transcription.words[j - 1];
                    // Insertions carry the canonical index they precede
                    insertions.push(AlignmentEntry {
                        canonical_token_index: i,
                        time_start: word.start_time,
                        time_end: word.end_time,
                        alignment_confidence: 0.0,
                        status: AlignmentStatus::Inserted,
                        transcribed_text: Some(word.word_text.clone()),
                        word_confidence: word.word_confidence,
                    });
                    j -= 1;
                }
                Step::Start => break,
            }
        }

        entries.reverse();
        insertions.reverse();

        let mut map = AlignmentMap { entries, insertions };
        self.enforce_monotonic(&mut map);

        debug!(
            aligned = map.aligned().count(),
            deleted = map.deleted().count(),
            inserted = map.insertions.len(),
            "Alignment complete"
        );

        map
    }

    /// Keep the most confident contiguous monotonic run of aligned
    /// entries; demote the rest to deleted
    fn enforce_monotonic(&self, map: &mut AlignmentMap) {
        let aligned_idx: Vec<usize> = map
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == AlignmentStatus::Aligned)
            .map(|(i, _)| i)
            .collect();

        if aligned_idx.len() < 2 {
            return;
        }

        let increasing = aligned_idx.windows(2).all(|w| {
            map.entries[w[0]].time_start < map.entries[w[1]].time_start
        });
        if increasing {
            return;
        }

        // Best run by total alignment confidence
        let mut best_range = (0, 1);
        let mut best_weight = f64::MIN;
        for start in 0..aligned_idx.len() {
            let mut weight = map.entries[aligned_idx[start]].alignment_confidence;
            let mut end = start + 1;
            while end < aligned_idx.len()
                && map.entries[aligned_idx[end - 1]].time_start
                    < map.entries[aligned_idx[end]].time_start
            {
                weight += map.entries[aligned_idx[end]].alignment_confidence;
                end += 1;
            }
            if weight > best_weight {
                best_weight = weight;
                best_range = (start, end);
            }
        }

        for (pos, &entry_idx) in aligned_idx.iter().enumerate() {
            if pos < best_range.0 || pos >= best_range.1 {
                let entry = &mut map.entries[entry_idx];
                entry.status = AlignmentStatus::Deleted;
                entry.alignment_confidence = 0.0;
                entry.time_start = 0.0;
                entry.time_end = 0.0;
                entry.transcribed_text = None;
                entry.word_confidence = 0.0;
            }
        }
    }
}
