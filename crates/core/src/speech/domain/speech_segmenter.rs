use thiserror::Error;

use crate::shared::sample_segment::{SampleSegment, SegmentError};

use super::speech_segmenter_config::{SegmenterConfigError, SpeechSegmenterConfig};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmenterError {
    #[error(transparent)]
    Config(#[from] SegmenterConfigError),
    #[error("speech region is invalid: {0}")]
    InvalidRegion(#[from] SegmentError),
}

/// RMS-based voice activity segmenter.
///
/// Produces time-ordered, non-overlapping speech regions whose lengths lie in
/// `[min_speech_samples, max_segment_samples]`.
pub struct SpeechSegmenter {
    config: SpeechSegmenterConfig,
}

impl SpeechSegmenter {
    pub fn new(config: SpeechSegmenterConfig) -> Self {
        Self { config }
    }

    pub fn segment(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<SampleSegment>, SegmenterError> {
        self.config.validate(sample_rate)?;

        let min_len = self.config.min_speech_samples(sample_rate);
        let merge_distance = self.config.merge_distance_samples(sample_rate);
        let max_len = self.config.max_segment_samples(sample_rate);

        let mask = speech_mask(samples, self.config.frame_size, self.config.rms_threshold);
        let runs = raw_runs(&mask);
        let merged = merge_close(&runs, merge_distance);
        let kept = filter_short(merged, min_len);
        let chunks = split_long(&kept, max_len, min_len)?;

        log::debug!(
            "VAD at {} Hz: {} raw runs, {} segments, {} chunks (min {}, merge {}, max {} samples)",
            sample_rate,
            runs.len(),
            kept.len(),
            chunks.len(),
            min_len,
            merge_distance,
            max_len
        );

        Ok(chunks)
    }
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new(SpeechSegmenterConfig::default())
    }
}

/// Per-sample speech flags. Every sample of a block whose RMS exceeds
/// `threshold` is marked; the trailing block may be shorter than `frame_size`.
fn speech_mask(samples: &[f32], frame_size: usize, threshold: f32) -> Vec<bool> {
    let mut mask = vec![false; samples.len()];
    for (block_index, block) in samples.chunks(frame_size).enumerate() {
        let sum_squares: f64 = block.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_squares / block.len() as f64).sqrt();
        if rms > threshold as f64 {
            let start = block_index * frame_size;
            mask[start..start + block.len()].fill(true);
        }
    }
    mask
}

fn raw_runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &speech) in mask.iter().enumerate() {
        match (speech, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                runs.push((start, i));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push((start, mask.len()));
    }
    runs
}

fn merge_close(runs: &[(usize, usize)], merge_distance: usize) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(runs.len());
    for &(start, end) in runs {
        match merged.last_mut() {
            Some(current) if start - current.1 < merge_distance => current.1 = end,
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn filter_short(segments: Vec<(usize, usize)>, min_len: usize) -> Vec<(usize, usize)> {
    segments
        .into_iter()
        .filter(|(start, end)| end - start >= min_len)
        .collect()
}

fn split_long(
    segments: &[(usize, usize)],
    max_len: usize,
    min_len: usize,
) -> Result<Vec<SampleSegment>, SegmentError> {
    let mut chunks = Vec::new();
    for &(start, end) in segments {
        if end - start <= max_len {
            chunks.push(SampleSegment::new(start, end)?);
            continue;
        }
        let mut chunk_start = start;
        while chunk_start < end {
            let chunk_end = (chunk_start + max_len).min(end);
            if chunk_end - chunk_start >= min_len {
                chunks.push(SampleSegment::new(chunk_start, chunk_end)?);
            }
            chunk_start = chunk_end;
        }
    }
    Ok(chunks)
}
