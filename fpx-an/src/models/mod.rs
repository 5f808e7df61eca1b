//! Data models for fpx-an (fluorescence analysis service)
//!
//! - Recording data: channels, behavioral events, assembled datasets
//! - Analysis request and its validated parameter form
//! - Analysis results (heatmap matrices and summary curves)
//! - Job lifecycle state machine

pub mod job;
pub mod recording;
pub mod request;
pub mod result;

pub use job::{Job, JobStatus, JobStatusResponse};
pub use recording::{Channel, DataItemRecord, Dataset, LabelEvent};
pub use request::{
    AlgorithmType, AnalysisMode, AnalysisParams, AnalyzeRequest, ColumnMap, DataSelection,
    EventGroup, EventSpec, MaskRange, OutputOptions, RequestMode, Selection, TagFilter,
    TimeWindow, DEFAULT_WARP_SEGMENT_LENGTH,
};
pub use result::{AnalysisResult, CurveEntry, MatrixEntry, ResultMeta, ResultResponse, TrialMatrix};
