//! Speech-to-text client
//!
//! Transcription runs in an external ASR service; this crate only
//! consumes it over HTTP. The trait seam keeps the pipeline testable
//! without a live model server.

use std::time::Duration;

use qari_common::{Error, Result};
use serde::Deserialize;

use crate::config::AsrConfig;
use crate::types::{TranscribedWord, TranscriptionResult};

#[async_trait::async_trait]
pub trait AsrService: Send + Sync {
    /// Transcribe normalized 16 kHz mono WAV bytes into word-level
    /// timestamps
    async fn transcribe(&self, audio: &[u8]) -> Result<TranscriptionResult>;
}

/// ASR over HTTP, posting raw audio and reading word timestamps back
pub struct HttpAsrClient {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    timeout: Duration,
}

/// Wire shape of the ASR service response
#[derive(Debug, Deserialize)]
struct AsrResponse {
    text: String,
    #[serde(default)]
    words: Vec<AsrWord>,
}

#[derive(Debug, Deserialize)]
struct AsrWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl HttpAsrClient {
    pub fn new(config: &AsrConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("ASR client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl AsrService for HttpAsrClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<TranscriptionResult> {
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("language", self.language.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec());

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| Error::AsrUnavailable("transcription timed out".to_string()))?
            .map_err(|e| Error::AsrUnavailable(format!("transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::AsrUnavailable(format!(
                "ASR service returned {}",
                response.status()
            )));
        }

        let body: AsrResponse = response
            .json()
            .await
            .map_err(|e| Error::AsrUnavailable(format!("malformed ASR response: {}", e)))?;

        Ok(TranscriptionResult {
            text: body.text,
            words: body
                .words
                .into_iter()
                .map(|w| TranscribedWord {
                    word_text: w.word,
                    start_time: w.start,
                    end_time: w.end,
                    word_confidence: w.confidence,
                })
                .collect(),
        })
    }
}
