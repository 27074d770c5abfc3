//! Arabic letter classes and text normalization
//!
//! The matcher and alignment engine compare text over the consonantal
//! skeleton: diacritics stripped, alef/yeh/teh-marbuta variants unified.
//! The letter class tables drive the tajweed annotations.

/// Arabic diacritics (harakat and related combining marks)
pub const DIACRITICS: [char; 12] = [
    '\u{064b}', // fathatan
    '\u{064c}', // dammatan
    '\u{064d}', // kasratan
    '\u{064e}', // fatha
    '\u{064f}', // damma
    '\u{0650}', // kasra
    '\u{0651}', // shadda
    '\u{0652}', // sukun
    '\u{0653}', // maddah
    '\u{0654}', // hamza above
    '\u{0655}', // hamza below
    '\u{0670}', // superscript alef
];

pub const SHADDA: char = '\u{0651}';
pub const SUKUN: char = '\u{0652}';
pub const MADDAH: char = '\u{0653}';

/// Tanween diacritics, relevant for noon-sakin adjacency rules
pub const TANWEEN: [char; 3] = ['\u{064b}', '\u{064c}', '\u{064d}'];

/// Elongation-bearing letters
pub const MADD_LETTERS: [char; 4] = ['ا', 'و', 'ي', 'ى'];

/// Nasalization-bearing letters
pub const GHUNNAH_LETTERS: [char; 2] = ['ن', 'م'];

/// Letters requiring an echoing bounce at a stop
pub const QALQALAH_LETTERS: [char; 5] = ['ق', 'ط', 'ب', 'ج', 'د'];

/// Letters the idgham rule assimilates noon-sakin into
pub const IDGHAM_LETTERS: [char; 6] = ['ي', 'ر', 'م', 'ل', 'و', 'ن'];

/// Letters triggering concealment of noon-sakin
pub const IKHFA_LETTERS: [char; 15] = [
    'ت', 'ث', 'ج', 'د', 'ذ', 'ز', 'س', 'ش', 'ص', 'ض', 'ط', 'ظ', 'ف', 'ق', 'ك',
];

/// The iqlab rule substitutes noon-sakin before this letter
pub const IQLAB_LETTER: char = 'ب';

pub fn is_diacritic(c: char) -> bool {
    DIACRITICS.contains(&c)
}

pub fn is_tanween(c: char) -> bool {
    TANWEEN.contains(&c)
}

/// Known confusable letter pairs (heavy/light and near-articulation
/// confusions the ASR plausibly swaps). Substitution errors are only
/// raised for these pairs.
pub fn confusable_with(expected: char) -> &'static [char] {
    match expected {
        'ق' => &['ك', 'غ'],
        'ط' => &['ت', 'د'],
        'ص' => &['س', 'ز'],
        'ض' => &['د', 'ظ'],
        'ظ' => &['ذ', 'ض'],
        'ع' => &['ا', 'ء'],
        'ح' => &['ه', 'خ'],
        'ذ' => &['ز', 'ظ'],
        'ث' => &['س', 'ت'],
        _ => &[],
    }
}

/// Pronunciation tip for letters with known confusions
pub fn letter_tip(letter: char) -> &'static str {
    match letter {
        'ق' => "Press back of tongue against soft palate. Different from \u{643} which uses middle of tongue.",
        'ط' => "Press tongue tip behind upper teeth with full mouth (heavy). Different from \u{62a} which is light.",
        'ص' => "Same position as \u{633} but with full/heavy mouth.",
        'ض' => "Unique to Arabic. Press tongue sides against upper molars.",
        'ظ' => "Like \u{630} but heavy/thick sound.",
        'ع' => "Deep throat sound from pharynx. Not a glottal stop like \u{621}.",
        'ح' => "Voiceless pharyngeal. Deeper than \u{647}, not as deep as \u{639}.",
        _ => "Practice this letter carefully with a teacher.",
    }
}

/// Correction audio sample id for a letter, when one exists
pub fn correction_audio_id(letter: char) -> Option<&'static str> {
    match letter {
        'ق' => Some("qa_01"),
        'ط' => Some("ta_emphatic_01"),
        'ص' => Some("sad_01"),
        'ض' => Some("dad_01"),
        'ظ' => Some("dha_emphatic_01"),
        'ع' => Some("ayn_01"),
        'ح' => Some("ha_01"),
        _ => None,
    }
}

/// Correction sample catalog served by /api/v1/correction/list
pub const CORRECTION_SAMPLES: [(&str, char, &str); 10] = [
    ("qa_01", 'ق', "Correct pronunciation of Qaf"),
    ("ta_emphatic_01", 'ط', "Correct pronunciation of emphatic Ta"),
    ("sad_01", 'ص', "Correct pronunciation of Sad"),
    ("dad_01", 'ض', "Correct pronunciation of Dad"),
    ("dha_emphatic_01", 'ظ', "Correct pronunciation of emphatic Dha"),
    ("ayn_01", 'ع', "Correct pronunciation of Ayn"),
    ("ha_01", 'ح', "Correct pronunciation of Ha"),
    ("madd_example", 'ا', "Madd elongation held for the prescribed counts"),
    ("ghunnah_example", 'ن', "Ghunnah nasalization held for two counts"),
    ("qalqalah_example", 'ق', "Qalqalah bounce at a stop"),
];

/// Normalize Arabic text for comparison
///
/// Strips diacritics, unifies alef and yeh variants, maps teh marbuta
/// to heh, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_diacritic(c) {
            continue;
        }
        match c {
            'أ' | 'إ' | 'آ' | 'ٱ' => out.push('ا'),
            'ى' => out.push('ي'),
            'ة' => out.push('ه'),
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Base (non-diacritic) characters of a token, with their char offsets
/// in the original token text
pub fn base_letters(token: &str) -> Vec<(usize, char)> {
    token
        .chars()
        .enumerate()
        .filter(|(_, c)| !is_diacritic(*c))
        .collect()
}
