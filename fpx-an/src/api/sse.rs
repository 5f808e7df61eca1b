//! Server-Sent Events (SSE) for job lifecycle streaming

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// GET /jobs/events - SSE stream of job events
///
/// Streams events:
/// - JobQueued
/// - JobProgress (on start and on each stage)
/// - JobSucceeded
/// - JobFailed
pub async fn job_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to job events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                // Heartbeat every 15 seconds
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            let event_type = event.event_type().to_string();
                            match serde_json::to_string(&event) {
                                Ok(event_json) => {
                                    debug!(job_id = %event.job_id(), "SSE: Broadcasting job event: {}", event_type);
                                    yield Ok(Event::default()
                                        .event(event_type)
                                        .data(event_json));
                                }
                                Err(e) => {
                                    warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: Client lagged, {} events dropped", skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: Event bus closed, ending stream");
                            break;
                        }
                    }
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
