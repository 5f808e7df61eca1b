//! Event types for the FPX event system
//!
//! Job lifecycle events are broadcast over an [`EventBus`] and can be
//! serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// FPX event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FpxEvent {
    /// Analysis job created and waiting to run
    JobQueued {
        job_id: Uuid,
        project_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Running job reported progress
    JobProgress {
        job_id: Uuid,
        project_id: i64,
        /// Percent complete (0-100)
        progress: u8,
        /// Current stage description
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Job finished and its result is retrievable
    JobSucceeded {
        job_id: Uuid,
        project_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Job terminated with an error
    JobFailed {
        job_id: Uuid,
        project_id: i64,
        /// Last progress value before failure
        progress: u8,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl FpxEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            FpxEvent::JobQueued { .. } => "JobQueued",
            FpxEvent::JobProgress { .. } => "JobProgress",
            FpxEvent::JobSucceeded { .. } => "JobSucceeded",
            FpxEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Job the event refers to
    pub fn job_id(&self) -> Uuid {
        match self {
            FpxEvent::JobQueued { job_id, .. }
            | FpxEvent::JobProgress { job_id, .. }
            | FpxEvent::JobSucceeded { job_id, .. }
            | FpxEvent::JobFailed { job_id, .. } => *job_id,
        }
    }
}

/// Broadcast bus for [`FpxEvent`]s
///
/// Uses `tokio::sync::broadcast`: publishing never blocks, slow subscribers
/// observe `Lagged` instead of stalling producers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FpxEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<FpxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FpxEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
