//! Event types and broadcast bus for the Qari analysis service
//!
//! Events are broadcast on an in-process bus and forwarded to SSE
//! subscribers. Emission never blocks the request path; events for which
//! no subscriber exists are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Analysis lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    /// An analysis request entered the pipeline
    AnalysisStarted {
        request_id: Uuid,
        user_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Upstream ASR produced a transcription for the request
    TranscriptionReady {
        request_id: Uuid,
        text: String,
        word_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Interim transcription produced during a streaming session
    InterimTranscription {
        session_id: Uuid,
        text: String,
        audio_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Analysis finished and the result was persisted
    AnalysisCompleted {
        request_id: Uuid,
        overall_score: f64,
        error_count: usize,
        auto_accepted: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Analysis failed before producing a result
    AnalysisFailed {
        request_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A recording was queued for human review
    ReviewQueued {
        recording_id: Uuid,
        priority: i64,
        low_confidence_errors: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Confidence thresholds were recalibrated from human review verdicts
    ThresholdsRecalibrated {
        adjusted_types: Vec<String>,
        reviews_consumed: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AnalysisEvent {
    /// Event type name used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            AnalysisEvent::AnalysisStarted { .. } => "AnalysisStarted",
            AnalysisEvent::TranscriptionReady { .. } => "TranscriptionReady",
            AnalysisEvent::InterimTranscription { .. } => "InterimTranscription",
            AnalysisEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            AnalysisEvent::AnalysisFailed { .. } => "AnalysisFailed",
            AnalysisEvent::ReviewQueued { .. } => "ReviewQueued",
            AnalysisEvent::ThresholdsRecalibrated { .. } => "ThresholdsRecalibrated",
        }
    }
}

/// Broadcast event bus shared by all request handlers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AnalysisEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the subscriber count, or 0 when nobody is listening.
    /// A bus with no subscribers is not an error.
    pub fn emit(&self, event: AnalysisEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!("Event emitted with no subscribers");
                0
            }
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
