//! Tajweed annotation derivation from diacritized verse text
//!
//! Annotations are computed once at corpus load and shared read-only by
//! every request. Detectors never re-derive rules from raw text; they
//! consume these flags.

use super::arabic::{
    self, base_letters, is_tanween, GHUNNAH_LETTERS, IDGHAM_LETTERS, IKHFA_LETTERS, IQLAB_LETTER,
    MADDAH, MADD_LETTERS, QALQALAH_LETTERS, SHADDA, SUKUN,
};
use serde::{Deserialize, Serialize};

/// Kind of elongation, with its prescribed count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaddKind {
    /// Natural madd, 2 counts
    Natural,
    /// Connected madd (madd letter followed by hamza), 4 counts
    Connected,
    /// Required madd (explicit maddah sign), 6 counts
    Required,
}

impl MaddKind {
    /// Prescribed elongation in counts
    pub fn expected_counts(&self) -> f64 {
        match self {
            MaddKind::Natural => 2.0,
            MaddKind::Connected => 4.0,
            MaddKind::Required => 6.0,
        }
    }
}

/// Adjacency rule between a noon-sakin/tanween ending and the next
/// token's first letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyRule {
    Idgham,
    Ikhfa,
    Iqlab,
}

/// A letter-scoped annotation within a token
///
/// `char_index` and `char_len` position the letter proportionally within
/// the token's time interval during detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetterAnnotation {
    pub letter: char,
    /// Char offset of the letter within the token text
    pub char_index: usize,
    /// Total char count of the token text
    pub char_len: usize,
}

/// All tajweed annotations for one canonical token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenAnnotations {
    /// Elongation-bearing letters and their madd kind
    pub madd: Vec<(LetterAnnotation, MaddKind)>,
    /// Nasalization-bearing letters
    pub ghunnah: Vec<LetterAnnotation>,
    /// Qalqalah letters in pause/stop position
    pub qalqalah: Vec<LetterAnnotation>,
    /// Rule triggered between this token's ending and the next token
    pub adjacency: Option<AdjacencyRule>,
}

impl TokenAnnotations {
    pub fn is_empty(&self) -> bool {
        self.madd.is_empty()
            && self.ghunnah.is_empty()
            && self.qalqalah.is_empty()
            && self.adjacency.is_none()
    }
}

/// Derive annotations for one token
///
/// `next_token` is the following token in the verse (for adjacency
/// rules); `verse_final` marks the last token, which sits at a
/// recitation pause boundary.
pub fn annotate_token(token: &str, next_token: Option<&str>, verse_final: bool) -> TokenAnnotations {
    let chars: Vec<char> = token.chars().collect();
    let char_len = chars.len();
    let bases = base_letters(token);

    let mut ann = TokenAnnotations::default();

    for (pos, (char_index, letter)) in bases.iter().enumerate() {
        let following = chars.get(char_index + 1).copied();
        let next_base = bases.get(pos + 1).map(|(_, c)| *c);
        let letter_ann = LetterAnnotation {
            letter: *letter,
            char_index: *char_index,
            char_len,
        };

        // Madd: explicit maddah sign is the 6-count required madd; a madd
        // letter followed by hamza is the 4-count connected madd; a bare
        // madd letter is the 2-count natural madd.
        if MADD_LETTERS.contains(letter) {
            let kind = if following == Some(MADDAH) {
                MaddKind::Required
            } else if matches!(next_base, Some('ء') | Some('ئ') | Some('ؤ') | Some('أ') | Some('إ'))
            {
                MaddKind::Connected
            } else {
                MaddKind::Natural
            };
            ann.madd.push((letter_ann.clone(), kind));
            continue;
        }

        // Ghunnah: noon or meem with shadda, explicit sukun, or token-final.
        if GHUNNAH_LETTERS.contains(letter) {
            let last_base = pos == bases.len() - 1;
            if following == Some(SHADDA) || following == Some(SUKUN) || last_base {
                ann.ghunnah.push(letter_ann.clone());
            }
        }

        // Qalqalah: only in pause/stop position, i.e. an explicit sukun on
        // the letter or the final letter of the verse-final token.
        if QALQALAH_LETTERS.contains(letter) {
            let last_base = pos == bases.len() - 1;
            if following == Some(SUKUN) || (last_base && verse_final) {
                ann.qalqalah.push(letter_ann);
            }
        }
    }

    ann.adjacency = next_token.and_then(|next| adjacency_rule(token, next));

    ann
}

/// Classify the (current token ending, next token start) letter pair
///
/// The trigger is noon-sakin (explicit sukun or bare final noon) or
/// tanween at the token end. Throat letters take izhar, which carries no
/// acoustic signature to check, so they map to `None`.
fn adjacency_rule(token: &str, next_token: &str) -> Option<AdjacencyRule> {
    let chars: Vec<char> = token.chars().collect();
    let bases = base_letters(token);
    let (last_index, last_base) = *bases.last()?;

    let ends_noon_sakin = last_base == 'ن'
        && chars
            .get(last_index + 1)
            .map_or(true, |c| *c == SUKUN);
    let ends_tanween = chars.last().map_or(false, |c| is_tanween(*c))
        || chars.iter().rev().take(2).any(|c| is_tanween(*c));

    if !ends_noon_sakin && !ends_tanween {
        return None;
    }

    let next_first = base_letters(next_token).first().map(|(_, c)| *c)?;

    if next_first == IQLAB_LETTER {
        Some(AdjacencyRule::Iqlab)
    } else if IDGHAM_LETTERS.contains(&next_first) {
        Some(AdjacencyRule::Idgham)
    } else if IKHFA_LETTERS.contains(&next_first) {
        Some(AdjacencyRule::Ikhfa)
    } else {
        None
    }
}

/// Maximum severity deduction opportunities in a token, used by the
/// scorer to bound the total deduction
pub fn annotation_count(ann: &TokenAnnotations) -> usize {
    ann.madd.len() + ann.ghunnah.len() + ann.qalqalah.len() + usize::from(ann.adjacency.is_some())
}
