//! Configuration for the analysis service
//!
//! Loaded from TOML (see `qari_common::config`) with environment
//! overrides for the operationally interesting knobs. Every detector
//! threshold lives here rather than in the detectors themselves; the
//! defaults are the empirically tuned values, not constants the code
//! depends on.

use qari_common::config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Listen address for the HTTP server
    pub bind_address: String,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Optional path to a full Quran corpus JSON file; the embedded
    /// minimal corpus is used when absent
    pub corpus_path: Option<PathBuf>,
    pub asr: AsrConfig,
    pub matcher: MatcherConfig,
    pub alignment: AlignmentConfig,
    pub detectors: DetectorConfig,
    pub scoring: ScoringConfig,
    pub review: ReviewConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            database_path: PathBuf::from("qari.db"),
            corpus_path: None,
            asr: AsrConfig::default(),
            matcher: MatcherConfig::default(),
            alignment: AlignmentConfig::default(),
            detectors: DetectorConfig::default(),
            scoring: ScoringConfig::default(),
            review: ReviewConfig::default(),
        }
    }
}

/// Upstream ASR collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrConfig {
    /// Transcription endpoint URL
    pub endpoint: String,
    /// Caller-imposed timeout on the ASR call, in milliseconds
    pub timeout_ms: u64,
    /// Language hint forwarded to the ASR service
    pub language: String,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000/transcribe".to_string(),
            timeout_ms: 30_000,
            language: "ar".to_string(),
        }
    }
}

/// Verse matcher floors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum similarity for a (surah, ayah) hint to be accepted
    /// without a corpus search
    pub hint_floor: f64,
    /// Absolute floor below which matching fails with NoMatchFound
    pub no_match_floor: f64,
    /// Two candidate scores within epsilon are tied; prefer fewer tokens
    pub tie_epsilon: f64,
    /// Pass threshold for the single-word quick-analysis path
    pub quick_pass_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            hint_floor: 0.55,
            no_match_floor: 0.35,
            tie_epsilon: 0.02,
            quick_pass_threshold: 0.75,
        }
    }
}

/// Alignment engine cost model and degradation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Fixed insertion/deletion cost in the dynamic program
    pub indel_cost: f64,
    /// Degradation ratio above which downstream detector confidences are
    /// penalized (AlignmentDegraded)
    pub degraded_ratio: f64,
    /// Multiplier applied to detector confidences under degradation
    pub degraded_confidence_penalty: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            indel_cost: 1.0,
            degraded_ratio: 0.4,
            degraded_confidence_penalty: 0.6,
        }
    }
}

/// Detector thresholds; "counts" are relative duration units
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Calibrated duration of one count, in seconds
    pub count_unit_secs: f64,
    /// Tolerance below the expected madd duration before madd_short
    pub madd_lower_tolerance: f64,
    /// Tolerance above the expected madd duration before madd_long
    pub madd_upper_tolerance: f64,
    /// Expected ghunnah duration in counts (~2)
    pub ghunnah_counts: f64,
    /// Minimum nasal-band energy ratio for ghunnah to be present
    pub ghunnah_nasal_ratio_floor: f64,
    /// Minimum peak/mean RMS burst ratio for qalqalah to be present
    pub qalqalah_burst_ratio_floor: f64,
    /// Minimum absolute peak RMS for a qalqalah bounce to count as strong
    pub qalqalah_energy_floor: f64,
    /// Minimum nasal-band ratio over a letter-pair junction for the
    /// idgham/ikhfa/iqlab signature to be considered present
    pub junction_nasal_ratio_floor: f64,
    /// Relative RMS threshold below which a frame counts as unvoiced
    pub voiced_rel_threshold: f32,
    /// Fraction of the expected ghunnah duration below which the hold
    /// counts as cut short
    pub ghunnah_lower_tolerance: f64,
    /// Minimum measurement window around a qalqalah letter, in seconds
    pub qalqalah_window_floor_secs: f64,
    /// Half-width of the junction window around a token boundary for
    /// the adjacency rules, in seconds
    pub junction_half_width_secs: f64,
    /// Fraction of clipped samples above which acoustic detectors fail
    /// closed (suppress emission rather than guess)
    pub max_clipped_fraction: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            count_unit_secs: 0.12,
            madd_lower_tolerance: 0.6,
            madd_upper_tolerance: 1.8,
            ghunnah_counts: 2.0,
            ghunnah_nasal_ratio_floor: 0.3,
            qalqalah_burst_ratio_floor: 1.5,
            qalqalah_energy_floor: 0.02,
            junction_nasal_ratio_floor: 0.25,
            voiced_rel_threshold: 0.3,
            ghunnah_lower_tolerance: 0.5,
            qalqalah_window_floor_secs: 0.2,
            junction_half_width_secs: 0.12,
            max_clipped_fraction: 0.01,
        }
    }
}

/// Severity weights for the overall score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub high_weight: f64,
    pub medium_weight: f64,
    pub low_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            high_weight: 0.15,
            medium_weight: 0.08,
            low_weight: 0.03,
        }
    }
}

/// Review router thresholds and recalibration policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Starting per-error-type confidence threshold
    pub default_threshold: f64,
    /// Rejection-rate band around 50% within which a threshold holds
    /// steady during recalibration
    pub recalibration_margin: f64,
    /// Step applied to a threshold per recalibration pass
    pub recalibration_step: f64,
    /// Minimum verdicts per error type before its threshold moves
    pub recalibration_min_samples: usize,
    /// Hard bounds the recalibrated thresholds never leave
    pub threshold_min: f64,
    pub threshold_max: f64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.6,
            recalibration_margin: 0.1,
            recalibration_step: 0.05,
            recalibration_min_samples: 3,
            threshold_min: 0.3,
            threshold_max: 0.95,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration (TOML file, then environment overrides)
    pub fn load() -> qari_common::Result<Self> {
        let mut cfg: AnalysisConfig = config::load_or_default(None)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Apply environment variable overrides on top of file values
    fn apply_env_overrides(&mut self) {
        if let Some(addr) = config::env_override::<String>("QARI_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(path) = config::env_override::<String>("QARI_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = config::env_override::<String>("QARI_CORPUS_PATH") {
            self.corpus_path = Some(PathBuf::from(path));
        }
        if let Some(endpoint) = config::env_override::<String>("QARI_ASR_ENDPOINT") {
            self.asr.endpoint = endpoint;
        }
        if let Some(timeout) = config::env_override::<u64>("QARI_ASR_TIMEOUT_MS") {
            self.asr.timeout_ms = timeout;
        }
        if let Some(threshold) = config::env_override::<f64>("QARI_REVIEW_THRESHOLD") {
            self.review.default_threshold = threshold;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = AnalysisConfig::default();
        assert!(cfg.matcher.no_match_floor < cfg.matcher.hint_floor);
        assert!(cfg.scoring.high_weight > cfg.scoring.medium_weight);
        assert!(cfg.scoring.medium_weight > cfg.scoring.low_weight);
        assert!(cfg.review.threshold_min < cfg.review.default_threshold);
        assert!(cfg.review.default_threshold < cfg.review.threshold_max);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AnalysisConfig = toml::from_str(
            r#"
            bind_address = "0.0.0.0:8080"

            [detectors]
            count_unit_secs = 0.15
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind_address, "0.0.0.0:8080");
        assert_eq!(cfg.detectors.count_unit_secs, 0.15);
        // Untouched sections keep their defaults
        assert_eq!(cfg.review.default_threshold, 0.6);
    }
}
