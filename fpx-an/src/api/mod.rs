//! HTTP API handlers for fpx-an
//!
//! REST endpoints for job submission and polling, label maps and file
//! previews, plus an SSE stream of job events.

pub mod analysis;
pub mod health;
pub mod label_map;
pub mod preview;
pub mod sse;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use label_map::label_map_routes;
pub use preview::preview_routes;
pub use sse::job_event_stream;
