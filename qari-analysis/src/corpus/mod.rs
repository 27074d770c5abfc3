//! Verse corpus index
//!
//! Canonical Quran text, tokenized with precomputed normalization keys
//! and tajweed annotations. Loaded once at process start and shared
//! read-only by all requests; no request may mutate it.

pub mod annotations;
pub mod arabic;

use annotations::{annotate_token, TokenAnnotations};
use qari_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One canonical token (word) of a verse
#[derive(Debug, Clone)]
pub struct VerseToken {
    /// Token text with diacritics
    pub token_text: String,
    /// Position within the verse
    pub token_index: usize,
    /// Precomputed normalized form (search key)
    pub normalized: String,
    /// Tajweed annotations for this token
    pub annotations: TokenAnnotations,
}

/// Canonical reference for one verse, immutable after load
#[derive(Debug, Clone)]
pub struct VerseReference {
    pub surah: u16,
    pub ayah: u16,
    /// Full verse text with diacritics
    pub canonical_text: String,
    /// Precomputed normalized form of the whole verse
    pub normalized_text: String,
    pub tokens: Vec<VerseToken>,
}

impl VerseReference {
    fn build(surah: u16, ayah: u16, text: &str) -> Self {
        let words: Vec<&str> = text.split_whitespace().collect();
        let tokens = words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                let next = words.get(i + 1).copied();
                let verse_final = i == words.len() - 1;
                VerseToken {
                    token_text: word.to_string(),
                    token_index: i,
                    normalized: arabic::normalize(word),
                    annotations: annotate_token(word, next, verse_final),
                }
            })
            .collect();

        Self {
            surah,
            ayah,
            canonical_text: text.to_string(),
            normalized_text: arabic::normalize(text),
            tokens,
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// JSON corpus file format: surah number -> { ayahs: { ayah -> text } }
#[derive(Debug, Deserialize)]
struct SurahRecord {
    #[serde(default)]
    ayahs: HashMap<String, String>,
}

/// The loaded verse corpus
pub struct QuranCorpus {
    verses: Vec<Arc<VerseReference>>,
    index: HashMap<(u16, u16), usize>,
}

impl QuranCorpus {
    /// Load the corpus from a JSON file, falling back to the embedded
    /// minimal corpus when the file is absent or unreadable
    pub fn load(path: Option<&Path>) -> Arc<QuranCorpus> {
        if let Some(path) = path {
            match Self::load_file(path) {
                Ok(corpus) => {
                    info!(
                        "Loaded {} verses from {}",
                        corpus.verses.len(),
                        path.display()
                    );
                    return Arc::new(corpus);
                }
                Err(e) => {
                    warn!(
                        "Cannot load corpus from {}: {}. Using embedded fallback.",
                        path.display(),
                        e
                    );
                }
            }
        }

        let corpus = Self::from_entries(FALLBACK_VERSES.iter().map(|(s, a, t)| (*s, *a, *t)));
        info!("Loaded embedded fallback corpus ({} verses)", corpus.verses.len());
        Arc::new(corpus)
    }

    fn load_file(path: &Path) -> Result<QuranCorpus> {
        let contents = std::fs::read_to_string(path)?;
        let raw: HashMap<String, SurahRecord> = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid corpus JSON: {}", e)))?;

        let mut entries = Vec::new();
        for (surah_str, record) in &raw {
            let surah: u16 = surah_str
                .parse()
                .map_err(|_| Error::Config(format!("Invalid surah number: {}", surah_str)))?;
            for (ayah_str, text) in &record.ayahs {
                let ayah: u16 = ayah_str
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid ayah number: {}", ayah_str)))?;
                entries.push((surah, ayah, text.as_str()));
            }
        }

        if entries.is_empty() {
            return Err(Error::Config("Corpus file contains no verses".to_string()));
        }

        Ok(Self::from_entries(entries.into_iter()))
    }

    fn from_entries<'a>(entries: impl Iterator<Item = (u16, u16, &'a str)>) -> QuranCorpus {
        let mut verses: Vec<Arc<VerseReference>> = entries
            .map(|(surah, ayah, text)| Arc::new(VerseReference::build(surah, ayah, text)))
            .collect();
        verses.sort_by_key(|v| (v.surah, v.ayah));

        let index = verses
            .iter()
            .enumerate()
            .map(|(i, v)| ((v.surah, v.ayah), i))
            .collect();

        QuranCorpus { verses, index }
    }

    /// Look up a verse by (surah, ayah)
    pub fn get(&self, surah: u16, ayah: u16) -> Option<Arc<VerseReference>> {
        self.index
            .get(&(surah, ayah))
            .map(|&i| Arc::clone(&self.verses[i]))
    }

    /// All verses in (surah, ayah) order
    pub fn verses(&self) -> &[Arc<VerseReference>] {
        &self.verses
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }
}

/// Embedded minimal corpus used when no corpus file is configured.
/// Short surahs recited by beginners, with full diacritics.
const FALLBACK_VERSES: &[(u16, u16, &str)] = &[
    (1, 1, "بِسْمِ اللَّهِ الرَّحْمَٰنِ الرَّحِيمِ"),
    (1, 2, "الْحَمْدُ لِلَّهِ رَبِّ الْعَالَمِينَ"),
    (1, 3, "الرَّحْمَٰنِ الرَّحِيمِ"),
    (1, 4, "مَالِكِ يَوْمِ الدِّينِ"),
    (1, 5, "إِيَّاكَ نَعْبُدُ وَإِيَّاكَ نَسْتَعِينُ"),
    (1, 6, "اهْدِنَا الصِّرَاطَ الْمُسْتَقِيمَ"),
    (
        1,
        7,
        "صِرَاطَ الَّذِينَ أَنْعَمْتَ عَلَيْهِمْ غَيْرِ الْمَغْضُوبِ عَلَيْهِمْ وَلَا الضَّالِّينَ",
    ),
    (112, 1, "قُلْ هُوَ اللَّهُ أَحَدٌ"),
    (112, 2, "اللَّهُ الصَّمَدُ"),
    (112, 3, "لَمْ يَلِدْ وَلَمْ يُولَدْ"),
    (112, 4, "وَلَمْ يَكُن لَّهُ كُفُوًا أَحَدٌ"),
    (113, 1, "قُلْ أَعُوذُ بِرَبِّ الْفَلَقِ"),
    (113, 2, "مِن شَرِّ مَا خَلَقَ"),
    (114, 1, "قُلْ أَعُوذُ بِرَبِّ النَّاسِ"),
    (114, 2, "مَلِكِ النَّاسِ"),
    (114, 3, "إِلَٰهِ النَّاسِ"),
];
