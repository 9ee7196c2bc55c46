use serde::{Deserialize, Serialize};

use crate::shared::constants::{DEFAULT_ENERGY_THRESHOLD, DEFAULT_FORMANT_SHIFT_THRESHOLD};
use crate::shared::time_segment::TimeSegment;

/// A frame qualifies when both of its values are strictly above these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    pub energy: f64,
    pub formant_shift: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            energy: DEFAULT_ENERGY_THRESHOLD,
            formant_shift: DEFAULT_FORMANT_SHIFT_THRESHOLD,
        }
    }
}

impl DetectionThresholds {
    pub fn with_energy(mut self, threshold: f64) -> Self {
        self.energy = threshold;
        self
    }

    pub fn with_formant_shift(mut self, threshold: f64) -> Self {
        self.formant_shift = threshold;
        self
    }
}

/// Spacing of analysis frames on the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub hop_size: usize,
    pub sample_rate: u32,
}

impl FrameTiming {
    pub fn frame_duration(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64
    }
}

/// Emit one frame-long segment for every qualifying frame.
///
/// Frames past the end of `formant_shifts` never qualify. No merging is done.
pub fn detect_segments(
    energies: &[f64],
    formant_shifts: &[f64],
    timing: FrameTiming,
    thresholds: &DetectionThresholds,
) -> Vec<TimeSegment> {
    let frame_duration = timing.frame_duration();
    energies
        .iter()
        .zip(formant_shifts)
        .enumerate()
        .filter(|(_, (energy, shift))| {
            **energy > thresholds.energy && **shift > thresholds.formant_shift
        })
        .map(|(i, _)| {
            let start = i as f64 * frame_duration;
            TimeSegment::new(start, start + frame_duration)
        })
        .collect()
}

/// Join time-ordered segments whose gap to the running segment is below
/// `min_gap` seconds. The first segment of each run keeps its annotation.
pub fn merge_segments(segments: &[TimeSegment], min_gap: f64) -> Vec<TimeSegment> {
    let mut merged: Vec<TimeSegment> = Vec::new();
    let mut current: Option<TimeSegment> = None;

    for segment in segments {
        current = match current.take() {
            Some(mut acc) if segment.start - acc.end < min_gap => {
                acc.end = segment.end;
                Some(acc)
            }
            Some(acc) => {
                merged.push(acc);
                Some(segment.clone())
            }
            None => Some(segment.clone()),
        };
    }
    merged.extend(current);
    merged
}
