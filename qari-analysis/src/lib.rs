//! qari-analysis - Quran recitation analysis service
//!
//! Accepts recitation recordings, transcribes them through an external
//! ASR service, matches them against the verse corpus, aligns
//! word-level timestamps, runs the tajweed rule detectors, scores the
//! recitation, and routes uncertain results to human review.

use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;

use qari_common::events::EventBus;

pub mod alignment;
pub mod api;
pub mod asr;
pub mod audio;
pub mod config;
pub mod corpus;
pub mod db;
pub mod detectors;
pub mod error;
pub mod features;
pub mod matcher;
pub mod pipeline;
pub mod review;
pub mod scoring;
pub mod types;

use asr::AsrService;
use config::AnalysisConfig;
use corpus::QuranCorpus;
use pipeline::AnalysisPipeline;
use review::ThresholdStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnalysisConfig>,
    pub db: SqlitePool,
    pub corpus: Arc<QuranCorpus>,
    pub events: EventBus,
    pub thresholds: Arc<ThresholdStore>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub asr: Arc<dyn AsrService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<AnalysisConfig>,
        db: SqlitePool,
        corpus: Arc<QuranCorpus>,
        events: EventBus,
        thresholds: Arc<ThresholdStore>,
        asr: Arc<dyn AsrService>,
    ) -> Self {
        let pipeline = Arc::new(AnalysisPipeline::new(
            config.clone(),
            corpus.clone(),
            asr.clone(),
            db.clone(),
            events.clone(),
            thresholds.clone(),
        ));
        Self {
            config,
            db,
            corpus,
            events,
            thresholds,
            pipeline,
            asr,
            started_at: Instant::now(),
        }
    }
}

pub use api::build_router;
