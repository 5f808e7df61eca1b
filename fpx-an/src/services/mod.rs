//! Services for fpx-an
//!
//! File parsing, dataset assembly and selection feed the engine; the job
//! registry and runner orchestrate it out of band.

pub mod analysis_runner;
pub mod csv_preview;
pub mod data_selector;
pub mod dataset_assembler;
pub mod event_loader;
pub mod job_persistence;
pub mod job_registry;
pub mod label_map_store;
pub mod recording_parser;
pub mod tabular;

pub use analysis_runner::{AnalysisRunner, AnalysisTask};
pub use csv_preview::{preview_file, PreviewTable};
pub use data_selector::{matches_filter, resolve_selection};
pub use dataset_assembler::{assemble_datasets, DirectoryKeywordPolicy, FileRole, PairingPolicy};
pub use event_loader::load_events;
pub use job_registry::JobRegistry;
pub use label_map_store::{LabelMap, LabelMapStore};
pub use recording_parser::parse_recording;
