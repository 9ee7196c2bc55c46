use thiserror::Error;

use super::feature_vector::FeatureVector;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureExtractionError {
    #[error("frame has {actual} samples, expected {expected}")]
    FrameLengthMismatch { expected: usize, actual: usize },
    #[error("buffer size {0} is too small for spectral analysis")]
    BufferTooSmall(usize),
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("non-finite sample at offset {0}")]
    NonFiniteSample(usize),
}

/// Parameters shared by every frame of one extraction pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    pub sample_rate: u32,
    pub buffer_size: usize,
}

/// Computes the features of a single analysis frame.
pub trait FeatureExtractor: Send + Sync {
    fn extract(
        &self,
        frame: &[f32],
        config: &FrameConfig,
    ) -> Result<FeatureVector, FeatureExtractionError>;
}
