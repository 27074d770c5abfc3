//! WebSocket recitation sessions
//!
//! Protocol: the client opens the socket, sends a `start` text frame
//! naming the verse, then streams raw PCM16LE mono 16 kHz audio as
//! binary frames. The server answers with `interim` transcriptions as
//! audio accumulates and, after the `finish` frame, runs the full
//! pipeline and sends the final `result` before closing.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use qari_common::events::AnalysisEvent;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::TARGET_SAMPLE_RATE;
use crate::pipeline::AnalysisRequest;
use crate::AppState;

/// Bytes of PCM16 mono 16 kHz per interim transcription pass (~2s)
const INTERIM_CHUNK_BYTES: usize = (TARGET_SAMPLE_RATE as usize) * 2 * 2;
/// Hard cap on buffered session audio (~5 minutes)
const MAX_SESSION_BYTES: usize = (TARGET_SAMPLE_RATE as usize) * 2 * 300;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Start {
        surah: u16,
        ayah: u16,
        #[serde(default)]
        user_id: Option<String>,
    },
    Finish,
}

/// GET /api/v1/ws/recite
pub async fn recite_session(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_session(state, socket))
}

async fn handle_session(state: AppState, mut socket: WebSocket) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "recitation session opened");

    let mut verse: Option<(u16, u16)> = None;
    let mut user_id = "anonymous".to_string();
    let mut pcm: Vec<u8> = Vec::new();
    let mut last_interim = 0usize;

    while let Some(message) = socket.recv().await {
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                debug!(session_id = %session_id, "socket error: {}", e);
                return;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Start {
                    surah,
                    ayah,
                    user_id: uid,
                }) => {
                    if state.corpus.get(surah, ayah).is_none() {
                        send_error(&mut socket, &format!("unknown verse {}:{}", surah, ayah))
                            .await;
                        return;
                    }
                    verse = Some((surah, ayah));
                    if let Some(uid) = uid {
                        user_id = uid;
                    }
                }
                Ok(ClientMessage::Finish) => break,
                Err(e) => {
                    send_error(&mut socket, &format!("bad control frame: {}", e)).await;
                    return;
                }
            },
            Message::Binary(chunk) => {
                if verse.is_none() {
                    send_error(&mut socket, "audio received before start frame").await;
                    return;
                }
                if pcm.len() + chunk.len() > MAX_SESSION_BYTES {
                    send_error(&mut socket, "session audio limit exceeded").await;
                    return;
                }
                pcm.extend_from_slice(&chunk);

                if pcm.len() - last_interim >= INTERIM_CHUNK_BYTES {
                    last_interim = pcm.len();
                    send_interim(&state, &mut socket, session_id, &pcm).await;
                }
            }
            Message::Close(_) => {
                info!(session_id = %session_id, "session closed before finish");
                return;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    let Some((surah, ayah)) = verse else {
        send_error(&mut socket, "finish received before start frame").await;
        return;
    };
    if pcm.is_empty() {
        send_error(&mut socket, "no audio received").await;
        return;
    }

    let request = AnalysisRequest {
        user_id,
        audio: pcm_to_wav(&pcm),
        hint: Some((surah, ayah)),
    };
    match state.pipeline.analyze(request).await {
        Ok(result) => {
            let payload = json!({ "type": "result", "result": result });
            if let Err(e) = socket.send(Message::Text(payload.to_string())).await {
                debug!(session_id = %session_id, "result send failed: {}", e);
            }
        }
        Err(e) => {
            warn!(session_id = %session_id, "session analysis failed: {}", e);
            send_error(&mut socket, &e.to_string()).await;
        }
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn send_interim(state: &AppState, socket: &mut WebSocket, session_id: Uuid, pcm: &[u8]) {
    let audio_seconds = pcm.len() as f64 / (TARGET_SAMPLE_RATE as f64 * 2.0);
    // Interim passes are best effort; a slow or failing ASR must not
    // tear down the session
    match state.asr.transcribe(&pcm_to_wav(pcm)).await {
        Ok(transcription) => {
            state.events.emit(AnalysisEvent::InterimTranscription {
                session_id,
                text: transcription.text.clone(),
                audio_seconds,
                timestamp: Utc::now(),
            });
            let payload = json!({
                "type": "interim",
                "text": transcription.text,
                "audio_seconds": audio_seconds,
            });
            let _ = socket.send(Message::Text(payload.to_string())).await;
        }
        Err(e) => {
            debug!(session_id = %session_id, "interim transcription failed: {}", e);
        }
    }
}

async fn send_error(socket: &mut WebSocket, message: &str) {
    let payload = json!({ "type": "error", "message": message });
    let _ = socket.send(Message::Text(payload.to_string())).await;
    let _ = socket.send(Message::Close(None)).await;
}

/// Wrap raw PCM16LE mono 16 kHz bytes in a WAV container
fn pcm_to_wav(pcm: &[u8]) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let sample_rate = TARGET_SAMPLE_RATE;
    let byte_rate = sample_rate * 2;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
