//! Review routing and threshold recalibration
//!
//! Every analysis is routed: results whose errors all clear their
//! per-type confidence threshold are auto-accepted, anything else is
//! queued for human review. Reviewer verdicts feed back into the
//! thresholds in batches, nudging each error type toward fewer false
//! positives or fewer needless reviews.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::ReviewConfig;
use crate::types::{DetectedError, ErrorType, RouteDecision};

/// Per-error-type confidence thresholds, shared across requests
pub struct ThresholdStore {
    thresholds: RwLock<HashMap<ErrorType, f64>>,
    default_threshold: f64,
}

impl ThresholdStore {
    pub fn new(default_threshold: f64) -> Self {
        Self {
            thresholds: RwLock::new(HashMap::new()),
            default_threshold,
        }
    }

    pub fn get(&self, error_type: ErrorType) -> f64 {
        self.read()
            .get(&error_type)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    pub fn set(&self, error_type: ErrorType, threshold: f64) {
        self.write().insert(error_type, threshold);
    }

    /// Current thresholds for every error type, defaults filled in
    pub fn snapshot(&self) -> HashMap<ErrorType, f64> {
        let stored = self.read();
        ErrorType::ALL
            .iter()
            .map(|t| (*t, stored.get(t).copied().unwrap_or(self.default_threshold)))
            .collect()
    }

    /// Replace stored thresholds wholesale (startup load from the
    /// database)
    pub fn load(&self, thresholds: HashMap<ErrorType, f64>) {
        *self.write() = thresholds;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ErrorType, f64>> {
        self.thresholds.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ErrorType, f64>> {
        self.thresholds.write().unwrap_or_else(|p| p.into_inner())
    }
}

/// One threshold change produced by recalibration
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdAdjustment {
    pub error_type: ErrorType,
    pub old_threshold: f64,
    pub new_threshold: f64,
}

pub struct ReviewRouter {
    config: ReviewConfig,
}

impl ReviewRouter {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    /// Decide whether a result can be auto-accepted or must be queued
    pub fn route(&self, errors: &[DetectedError], thresholds: &ThresholdStore) -> RouteDecision {
        let low_confidence: Vec<DetectedError> = errors
            .iter()
            .filter(|e| e.confidence < thresholds.get(e.error_type))
            .cloned()
            .collect();

        if low_confidence.is_empty() {
            return RouteDecision::AutoAccepted;
        }

        let min_confidence = low_confidence
            .iter()
            .map(|e| e.confidence)
            .fold(f64::INFINITY, f64::min);
        RouteDecision::Queued {
            priority: queue_priority(low_confidence.len(), min_confidence),
            low_confidence_errors: low_confidence,
        }
    }

    /// Adjust thresholds from a batch of (error type, reviewer
    /// confirmed) verdict samples
    ///
    /// Types with too few samples are left alone. A high rejection rate
    /// raises the threshold so more of that type gets reviewed; a high
    /// confirmation rate lowers it so fewer do.
    pub fn recalibrate(
        &self,
        samples: &[(ErrorType, bool)],
        thresholds: &ThresholdStore,
    ) -> Vec<ThresholdAdjustment> {
        let cfg = &self.config;
        let mut by_type: HashMap<ErrorType, (usize, usize)> = HashMap::new();
        for (error_type, confirmed) in samples {
            let entry = by_type.entry(*error_type).or_insert((0, 0));
            entry.0 += 1;
            if !*confirmed {
                entry.1 += 1;
            }
        }

        let mut adjustments = Vec::new();
        for (error_type, (total, rejected)) in by_type {
            if total < cfg.recalibration_min_samples {
                continue;
            }
            let rejection_rate = rejected as f64 / total as f64;
            let old = thresholds.get(error_type);
            let new = if rejection_rate > 0.5 + cfg.recalibration_margin {
                old + cfg.recalibration_step
            } else if rejection_rate < 0.5 - cfg.recalibration_margin {
                old - cfg.recalibration_step
            } else {
                continue;
            };
            let new = new.clamp(cfg.threshold_min, cfg.threshold_max);
            if (new - old).abs() < f64::EPSILON {
                continue;
            }
            thresholds.set(error_type, new);
            adjustments.push(ThresholdAdjustment {
                error_type,
                old_threshold: old,
                new_threshold: new,
            });
        }

        adjustments.sort_by(|a, b| a.error_type.as_str().cmp(b.error_type.as_str()));
        adjustments
    }
}

/// Queue priority: more uncertain errors first, ties broken by age in
/// the queue query itself
pub fn queue_priority(low_confidence_count: usize, min_confidence: f64) -> i64 {
    let uncertainty = (1.0 - min_confidence.clamp(0.0, 1.0)) * 20.0;
    low_confidence_count as i64 * 10 + uncertainty.round() as i64
}
