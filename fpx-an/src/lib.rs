//! fpx-an library interface
//!
//! Fluorescence (ΔF/F) analysis service. Exposes public APIs for integration
//! testing and for the `fpx-an` binary.

pub mod api;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{AnalysisError, ApiError, ApiResult, PipelineResult};

use axum::Router;
use chrono::{DateTime, Utc};
use fpx_common::config::RootLayout;
use fpx_common::events::EventBus;
use std::sync::Arc;

use crate::db::DataCatalog;
use crate::services::{AnalysisRunner, JobRegistry, LabelMapStore, PairingPolicy};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// In-memory job store
    pub registry: Arc<JobRegistry>,
    /// Spawns analysis jobs
    pub runner: AnalysisRunner,
    /// Data-item catalog
    pub catalog: Arc<dyn DataCatalog>,
    pub label_maps: LabelMapStore,
    /// On-disk layout under the root folder
    pub layout: RootLayout,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        layout: RootLayout,
        catalog: Arc<dyn DataCatalog>,
        policy: Arc<dyn PairingPolicy>,
        event_bus: EventBus,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new(
            Some(layout.clone()),
            Some(event_bus.clone()),
        ));
        let runner = AnalysisRunner::new(
            Arc::clone(&registry),
            Arc::clone(&catalog),
            policy,
            layout.uploads_dir(),
        );
        Self {
            registry,
            runner,
            catalog,
            label_maps: LabelMapStore::new(layout.clone()),
            layout,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(api::analysis_routes())
        .merge(api::label_map_routes())
        .merge(api::preview_routes())
        .merge(api::health_routes())
        .route("/jobs/events", get(api::job_event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
