//! Server-Sent Events stream of analysis lifecycle events

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tracing::{debug, info};

use crate::AppState;

/// GET /api/v1/events
///
/// Forwards every bus event to the client, named by its variant. A
/// subscriber that falls behind the channel capacity misses the lagged
/// events and continues from the current position.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to analysis events");
    let mut rx = state.events.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(payload) => {
                            yield Ok(Event::default().event(name).data(payload));
                        }
                        Err(e) => {
                            debug!("SSE: dropping unserializable event: {}", e);
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    debug!("SSE: client lagged, {} events dropped", missed);
                    yield Ok(Event::default()
                        .event("Lagged")
                        .data(missed.to_string()));
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
