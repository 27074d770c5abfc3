//! qari-analysis - recitation analysis service entry point

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use qari_analysis::asr::HttpAsrClient;
use qari_analysis::config::AnalysisConfig;
use qari_analysis::corpus::QuranCorpus;
use qari_analysis::review::ThresholdStore;
use qari_analysis::{db, AppState};
use qari_common::events::EventBus;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting qari-analysis service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(AnalysisConfig::load()?);
    info!("ASR endpoint: {}", config.asr.endpoint);

    let db_pool = db::init_database(&config.database_path).await?;
    info!("Database connection established");

    let corpus = QuranCorpus::load(config.corpus_path.as_deref());
    info!("Corpus loaded: {} verses", corpus.len());

    let thresholds = Arc::new(ThresholdStore::new(config.review.default_threshold));
    let stored = db::thresholds::load_thresholds(&db_pool).await?;
    if !stored.is_empty() {
        info!("Restored {} recalibrated thresholds", stored.len());
        thresholds.load(stored);
    }

    let asr = Arc::new(HttpAsrClient::new(&config.asr)?);
    let event_bus = EventBus::new(100);

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, db_pool, corpus, event_bus, thresholds, asr);
    let app = qari_analysis::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
