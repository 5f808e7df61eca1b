//! Job snapshot files
//!
//! `status.json` mirrors the in-memory job after every transition and
//! `result.json` holds the final result. Neither is authoritative while the
//! process runs: the registry is. Files are written to a temporary name and
//! renamed so readers never see a partial document.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::{Job, ResultResponse};

pub const STATUS_FILE: &str = "status.json";
pub const RESULT_FILE: &str = "result.json";

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Write `status.json` into the job's directory
pub async fn write_status(dir: &Path, job: &Job) -> std::io::Result<()> {
    write_json_atomic(&dir.join(STATUS_FILE), job).await
}

/// Write `result.json` into the job's directory, returning its path
pub async fn write_result(dir: &Path, result: &ResultResponse) -> std::io::Result<PathBuf> {
    let path = dir.join(RESULT_FILE);
    write_json_atomic(&path, result).await?;
    Ok(path)
}

#[cfg(test)]
pub(crate) async fn read_status(dir: &Path) -> std::io::Result<Job> {
    let bytes = tokio::fs::read(dir.join(STATUS_FILE)).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
