//! Recording parser
//!
//! Channel columns are named `CH<n>-410` (reference) and `CH<n>-470`
//! (indicator), matched case-insensitively after trimming. All other
//! columns are ignored. Channels keep the order in which their number first
//! appears in the header.

use std::path::Path;
use tracing::{debug, info};

use super::tabular;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::Channel;

/// Reference (isosbestic) wavelength marker
pub const REFERENCE_MARKER: &str = "410";
/// Indicator wavelength marker
pub const INDICATOR_MARKER: &str = "470";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wavelength {
    Reference,
    Indicator,
}

/// Column positions of one detected channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelColumns {
    pub number: u32,
    pub reference: usize,
    pub indicator: usize,
}

impl ChannelColumns {
    pub fn name(&self) -> String {
        format!("CH{}", self.number)
    }
}

/// Match `CH<n>-<marker>`
fn parse_channel_header(header: &str) -> Option<(u32, Wavelength)> {
    let header = header.trim();
    let prefix = header.get(..2)?;
    if !prefix.eq_ignore_ascii_case("ch") {
        return None;
    }
    let (number, marker) = header[2..].split_once('-')?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let wavelength = match marker {
        REFERENCE_MARKER => Wavelength::Reference,
        INDICATOR_MARKER => Wavelength::Indicator,
        _ => return None,
    };
    Some((number.parse().ok()?, wavelength))
}

/// Group channel columns by number and check every channel is complete
pub fn detect_channel_columns(headers: &[String], path: &Path) -> PipelineResult<Vec<ChannelColumns>> {
    let mut found: Vec<(u32, Option<usize>, Option<usize>)> = Vec::new();

    for (idx, header) in headers.iter().enumerate() {
        let Some((number, wavelength)) = parse_channel_header(header) else {
            continue;
        };
        let pos = match found.iter().position(|(n, _, _)| *n == number) {
            Some(pos) => pos,
            None => {
                found.push((number, None, None));
                found.len() - 1
            }
        };
        let entry = &mut found[pos];
        match wavelength {
            Wavelength::Reference => entry.1 = Some(idx),
            Wavelength::Indicator => entry.2 = Some(idx),
        }
    }

    let mut channels = Vec::with_capacity(found.len());
    for (number, reference, indicator) in found {
        match (reference, indicator) {
            (Some(reference), Some(indicator)) => channels.push(ChannelColumns {
                number,
                reference,
                indicator,
            }),
            (None, _) => {
                return Err(AnalysisError::MissingChannelPair {
                    channel: number,
                    missing: REFERENCE_MARKER.to_string(),
                })
            }
            (_, None) => {
                return Err(AnalysisError::MissingChannelPair {
                    channel: number,
                    missing: INDICATOR_MARKER.to_string(),
                })
            }
        }
    }

    if channels.is_empty() {
        return Err(AnalysisError::NoChannelsFound {
            path: path.display().to_string(),
        });
    }
    Ok(channels)
}

/// Keep-flags for `len` samples after removing the masked ranges (seconds)
///
/// A range covers `[trunc(start * fps), min(trunc(end * fps), len))`.
pub fn mask_keep_flags(len: usize, masks: &[(f64, f64)], fps: f64) -> Vec<bool> {
    let mut keep = vec![true; len];
    for &(start, end) in masks {
        let start_idx = ((start * fps) as i64).max(0) as usize;
        let end_idx = ((end * fps) as i64).max(0) as usize;
        for flag in keep.iter_mut().take(end_idx.min(len)).skip(start_idx) {
            *flag = false;
        }
    }
    keep
}

fn retain_by(values: Vec<f64>, keep: &[bool]) -> Vec<f64> {
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(v, &k)| k.then_some(v))
        .collect()
}

/// Parse a recording file into channels, applying sample masks
pub fn parse_recording(path: &Path, fps: f64, masks: &[(f64, f64)]) -> PipelineResult<Vec<Channel>> {
    let mut reader = tabular::open(path)?;
    let headers = tabular::headers(&mut reader, path)?;
    let columns = detect_channel_columns(&headers, path)?;

    let mut signals: Vec<(Vec<f64>, Vec<f64>)> = vec![(Vec::new(), Vec::new()); columns.len()];
    for record in reader.records() {
        let record = record.map_err(|e| AnalysisError::source_read(path, e))?;
        for (cols, (reference, indicator)) in columns.iter().zip(signals.iter_mut()) {
            reference.push(tabular::parse_f64(&record, cols.reference, path)?);
            indicator.push(tabular::parse_f64(&record, cols.indicator, path)?);
        }
    }

    let len = signals.first().map_or(0, |(r, _)| r.len());
    let keep = mask_keep_flags(len, masks, fps);
    let removed = keep.iter().filter(|k| !**k).count();
    if removed > 0 {
        debug!(path = %path.display(), removed, "Applied sample masks");
    }

    let mut channels = Vec::with_capacity(columns.len());
    for (cols, (reference, indicator)) in columns.iter().zip(signals) {
        let reference = retain_by(reference, &keep);
        let indicator = retain_by(indicator, &keep);
        let channel = Channel::new(cols.name(), reference, indicator)
            .ok_or_else(|| AnalysisError::source_read(path, "channel signals differ in length"))?;
        channels.push(channel);
    }

    info!(
        path = %path.display(),
        channels = channels.len(),
        samples = channels.first().map_or(0, Channel::len),
        "Parsed recording"
    );
    Ok(channels)
}
