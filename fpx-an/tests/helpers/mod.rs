//! Shared fixtures for fpx-an integration tests
//!
//! Each fixture owns a temporary root folder laid out like a real install:
//! data files under `uploads/`, catalog in `fpx.db`.

#![allow(dead_code)]

use std::sync::Arc;

use fpx_an::db::{init_database_pool, SqliteCatalog};
use fpx_an::services::DirectoryKeywordPolicy;
use fpx_an::AppState;
use fpx_common::config::RootLayout;
use fpx_common::events::EventBus;

pub const FPS: f64 = 20.0;
pub const SAMPLES: usize = 400;

pub struct Fixture {
    pub root: tempfile::TempDir,
    pub layout: RootLayout,
    pub catalog: SqliteCatalog,
    pub state: AppState,
}

pub async fn fixture() -> Fixture {
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    let layout = RootLayout::new(root.path());
    layout.ensure_directories().expect("Failed to create uploads dir");

    let pool = init_database_pool(&layout.database_path())
        .await
        .expect("Failed to open catalog database");
    let catalog = SqliteCatalog::new(pool);

    let state = AppState::new(
        layout.clone(),
        Arc::new(catalog.clone()),
        Arc::new(DirectoryKeywordPolicy::default()),
        EventBus::new(64),
    );

    Fixture {
        root,
        layout,
        catalog,
        state,
    }
}

/// Two-wavelength recording with a single channel `CH1`
pub fn recording_csv() -> String {
    let mut csv = String::from("Time,CH1-410,CH1-470\n");
    for i in 0..SAMPLES {
        let t = i as f64 / FPS;
        let reference = 1.0 + 0.01 * (i as f64 * 0.1).sin();
        let indicator = 2.0 + 0.02 * (i as f64 * 0.1).sin() + 0.05 * (i as f64 * 0.37).cos();
        csv.push_str(&format!("{:.3},{:.6},{:.6}\n", t, reference, indicator));
    }
    csv
}

/// Point-event annotation file
pub fn annotation_csv(events: &[(&str, f64)]) -> String {
    let mut csv = String::from("Behavior,Start\n");
    for (label, start) in events {
        csv.push_str(&format!("{},{}\n", label, start));
    }
    csv
}

impl Fixture {
    /// Write a file under `uploads/` and register it in the catalog
    pub async fn add_file(&self, project_id: i64, relative: &str, contents: &str) -> i64 {
        let path = self.layout.uploads_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create fixture dir");
        }
        std::fs::write(&path, contents).expect("Failed to write fixture file");
        self.catalog
            .register_data_item(project_id, relative, None)
            .await
            .expect("Failed to register data item")
    }

    /// Recording plus co-located annotation; returns (recording id, annotation id)
    pub async fn add_session(&self, project_id: i64, dir: &str, events: &[(&str, f64)]) -> (i64, i64) {
        let recording = self
            .add_file(project_id, &format!("{}/photometry.csv", dir), &recording_csv())
            .await;
        let annotation = self
            .add_file(project_id, &format!("{}/behavior.csv", dir), &annotation_csv(events))
            .await;
        (recording, annotation)
    }
}
