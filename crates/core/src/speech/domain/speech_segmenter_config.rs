use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    MAX_CHUNK_SECS, MERGE_GAP_SECS, MIN_SPEECH_SECS, VAD_FRAME_SIZE, VAD_RMS_THRESHOLD,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmenterConfigError {
    #[error("frame size must be at least 1 sample")]
    ZeroFrameSize,
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidValue { name: &'static str, value: f64 },
    #[error("max chunk duration must be positive (got {0} s)")]
    NonPositiveMaxChunk(f64),
    #[error("max chunk duration {secs} s is shorter than one sample at {sample_rate} Hz")]
    MaxChunkBelowOneSample { secs: f64, sample_rate: u32 },
    #[error("max chunk duration {max_secs} s is shorter than min speech duration {min_secs} s")]
    MaxChunkBelowMinSpeech { max_secs: f64, min_secs: f64 },
}

/// Parameters of the RMS voice activity segmenter.
///
/// Durations are in seconds and are converted to sample counts with
/// `floor(secs * sample_rate)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSegmenterConfig {
    /// Samples per RMS block. Blocks do not overlap; the last one may be short.
    pub frame_size: usize,

    /// A block whose RMS is strictly above this is speech.
    pub rms_threshold: f32,

    /// Segments shorter than this are dropped, both after merging and
    /// after splitting.
    pub min_duration_secs: f64,

    /// Neighbouring segments separated by less than this are joined.
    pub merge_gap_secs: f64,

    /// Upper bound on the length of any emitted segment.
    pub max_chunk_duration_secs: f64,
}

impl Default for SpeechSegmenterConfig {
    fn default() -> Self {
        Self {
            frame_size: VAD_FRAME_SIZE,
            rms_threshold: VAD_RMS_THRESHOLD,
            min_duration_secs: MIN_SPEECH_SECS,
            merge_gap_secs: MERGE_GAP_SECS,
            max_chunk_duration_secs: MAX_CHUNK_SECS,
        }
    }
}

impl SpeechSegmenterConfig {
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    pub fn with_rms_threshold(mut self, threshold: f32) -> Self {
        self.rms_threshold = threshold;
        self
    }

    pub fn with_min_duration_secs(mut self, secs: f64) -> Self {
        self.min_duration_secs = secs;
        self
    }

    pub fn with_merge_gap_secs(mut self, secs: f64) -> Self {
        self.merge_gap_secs = secs;
        self
    }

    pub fn with_max_chunk_duration_secs(mut self, secs: f64) -> Self {
        self.max_chunk_duration_secs = secs;
        self
    }

    pub fn min_speech_samples(&self, sample_rate: u32) -> usize {
        secs_to_samples(self.min_duration_secs, sample_rate)
    }

    pub fn merge_distance_samples(&self, sample_rate: u32) -> usize {
        secs_to_samples(self.merge_gap_secs, sample_rate)
    }

    pub fn max_segment_samples(&self, sample_rate: u32) -> usize {
        secs_to_samples(self.max_chunk_duration_secs, sample_rate)
    }

    /// Check that the parameters describe a usable segmentation at `sample_rate`.
    pub fn validate(&self, sample_rate: u32) -> Result<(), SegmenterConfigError> {
        if self.frame_size == 0 {
            return Err(SegmenterConfigError::ZeroFrameSize);
        }
        if sample_rate == 0 {
            return Err(SegmenterConfigError::ZeroSampleRate);
        }
        check_non_negative("rms_threshold", self.rms_threshold as f64)?;
        check_non_negative("min_duration_secs", self.min_duration_secs)?;
        check_non_negative("merge_gap_secs", self.merge_gap_secs)?;

        let max = self.max_chunk_duration_secs;
        if !max.is_finite() || max <= 0.0 {
            return Err(SegmenterConfigError::NonPositiveMaxChunk(max));
        }
        if self.max_segment_samples(sample_rate) == 0 {
            return Err(SegmenterConfigError::MaxChunkBelowOneSample {
                secs: max,
                sample_rate,
            });
        }
        if max < self.min_duration_secs {
            return Err(SegmenterConfigError::MaxChunkBelowMinSpeech {
                max_secs: max,
                min_secs: self.min_duration_secs,
            });
        }
        Ok(())
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), SegmenterConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SegmenterConfigError::InvalidValue { name, value });
    }
    Ok(())
}

fn secs_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs * sample_rate as f64).floor().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_sample_counts_at_44100() {
        let config = SpeechSegmenterConfig::default();
        assert_eq!(config.min_speech_samples(44100), 11025);
        assert_eq!(config.merge_distance_samples(44100), 8820);
        assert_eq!(config.max_segment_samples(44100), 88200);
    }

    #[test]
    fn test_sample_counts_floor() {
        let config = SpeechSegmenterConfig::default().with_min_duration_secs(0.25);
        // 0.25 * 22051 = 5512.75
        assert_eq!(config.min_speech_samples(22051), 5512);
    }

    #[test]
    fn test_default_validates() {
        assert!(SpeechSegmenterConfig::default().validate(44100).is_ok());
    }

    #[rstest]
    #[case::zero_max(SpeechSegmenterConfig::default().with_max_chunk_duration_secs(0.0))]
    #[case::negative_max(SpeechSegmenterConfig::default().with_max_chunk_duration_secs(-1.0))]
    #[case::nan_max(SpeechSegmenterConfig::default().with_max_chunk_duration_secs(f64::NAN))]
    #[case::infinite_max(SpeechSegmenterConfig::default().with_max_chunk_duration_secs(f64::INFINITY))]
    fn test_validate_rejects_non_positive_max_chunk(#[case] config: SpeechSegmenterConfig) {
        assert!(matches!(
            config.validate(44100),
            Err(SegmenterConfigError::NonPositiveMaxChunk(_))
        ));
    }

    #[test]
    fn test_validate_rejects_max_chunk_below_one_sample() {
        let config = SpeechSegmenterConfig::default()
            .with_min_duration_secs(0.0)
            .with_max_chunk_duration_secs(0.0001);
        assert!(matches!(
            config.validate(8000),
            Err(SegmenterConfigError::MaxChunkBelowOneSample { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_max_chunk_below_min_speech() {
        let config = SpeechSegmenterConfig::default()
            .with_min_duration_secs(1.0)
            .with_max_chunk_duration_secs(0.5);
        assert!(matches!(
            config.validate(44100),
            Err(SegmenterConfigError::MaxChunkBelowMinSpeech { .. })
        ));
    }

    #[rstest]
    #[case::negative_threshold(SpeechSegmenterConfig::default().with_rms_threshold(-0.1), "rms_threshold")]
    #[case::negative_min(SpeechSegmenterConfig::default().with_min_duration_secs(-0.25), "min_duration_secs")]
    #[case::nan_gap(SpeechSegmenterConfig::default().with_merge_gap_secs(f64::NAN), "merge_gap_secs")]
    fn test_validate_rejects_invalid_values(
        #[case] config: SpeechSegmenterConfig,
        #[case] expected: &str,
    ) {
        match config.validate(44100) {
            Err(SegmenterConfigError::InvalidValue { name, .. }) => assert_eq!(name, expected),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_frame_size_and_rate() {
        let config = SpeechSegmenterConfig::default();
        assert_eq!(
            config.clone().with_frame_size(0).validate(44100),
            Err(SegmenterConfigError::ZeroFrameSize)
        );
        assert_eq!(config.validate(0), Err(SegmenterConfigError::ZeroSampleRate));
    }

    #[test]
    fn test_deserialize_fills_missing_fields_with_defaults() {
        let config: SpeechSegmenterConfig =
            serde_json::from_str(r#"{"max_chunk_duration_secs": 3.0}"#).unwrap();
        assert_eq!(config.frame_size, VAD_FRAME_SIZE);
        assert_eq!(config.max_chunk_duration_secs, 3.0);
    }
}
