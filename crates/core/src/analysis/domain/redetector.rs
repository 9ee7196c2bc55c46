use thiserror::Error;

use crate::shared::constants::MERGE_GAP_FRAMES;
use crate::shared::time_segment::TimeSegment;

use super::analysis_record::AnalysisRecord;
use super::segment_detector::{detect_segments, merge_segments, DetectionThresholds, FrameTiming};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedetectError {
    #[error("analysis has no stored {0} series")]
    MissingSeriesData(&'static str),
    #[error("analysis has no usable frame timing (hop size {hop_size:?}, sample rate {sample_rate:?})")]
    InvalidFrameTiming {
        hop_size: Option<usize>,
        sample_rate: Option<u32>,
    },
}

/// Detect and merge segments from the normalized series stored on `record`.
///
/// Works from the persisted series only; no audio is needed.
pub fn redetect(
    record: &AnalysisRecord,
    thresholds: &DetectionThresholds,
) -> Result<Vec<TimeSegment>, RedetectError> {
    let energies = record
        .normalized_energy_values
        .as_ref()
        .ok_or(RedetectError::MissingSeriesData("normalizedEnergyValues"))?;
    let shifts = record
        .normalized_formant_shifts
        .as_ref()
        .ok_or(RedetectError::MissingSeriesData("normalizedFormantShifts"))?;
    let timing = match (record.hop_size, record.sample_rate) {
        (Some(hop_size), Some(sample_rate)) if hop_size > 0 && sample_rate > 0 => FrameTiming {
            hop_size,
            sample_rate,
        },
        (hop_size, sample_rate) => {
            return Err(RedetectError::InvalidFrameTiming {
                hop_size,
                sample_rate,
            })
        }
    };

    let detected = detect_segments(energies.values(), shifts.values(), timing, thresholds);
    let merged = merge_segments(&detected, MERGE_GAP_FRAMES * timing.frame_duration());
    log::debug!(
        "Redetected {} frames into {} segments (energy > {}, shift > {})",
        detected.len(),
        merged.len(),
        thresholds.energy,
        thresholds.formant_shift
    );
    Ok(merged)
}

/// Replace `record.detected_segments` with a fresh detection.
///
/// The record is left untouched when detection fails.
pub fn redetect_into<'a>(
    record: &'a mut AnalysisRecord,
    thresholds: &DetectionThresholds,
) -> Result<&'a [TimeSegment], RedetectError> {
    record.detected_segments = redetect(record, thresholds)?;
    Ok(&record.detected_segments)
}
