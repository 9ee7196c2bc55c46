use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    ANALYSIS_BUFFER_SIZE, ANALYSIS_HOP_SIZE, SPECTROGRAM_BINS, SPECTROGRAM_SCALE,
};

use super::feature_extractor::{FeatureExtractor, FrameConfig};
use super::feature_track::FeatureTrack;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameAnalysisError {
    #[error("buffer size must be at least 1 sample")]
    ZeroBufferSize,
    #[error("hop size must be at least 1 sample")]
    ZeroHopSize,
    #[error("sample rate must be positive")]
    ZeroSampleRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameAnalysisConfig {
    pub buffer_size: usize,
    pub hop_size: usize,
    /// Amplitude-spectrum bins kept per spectrogram column.
    pub spectrogram_bins: usize,
    /// Amplitudes are divided by this before capping at 1.
    pub spectrogram_scale: f64,
}

impl Default for FrameAnalysisConfig {
    fn default() -> Self {
        Self {
            buffer_size: ANALYSIS_BUFFER_SIZE,
            hop_size: ANALYSIS_HOP_SIZE,
            spectrogram_bins: SPECTROGRAM_BINS,
            spectrogram_scale: SPECTROGRAM_SCALE,
        }
    }
}

impl FrameAnalysisConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop_size = hop_size;
        self
    }

    /// Number of full frames a signal of `len` samples yields.
    pub fn frame_count(&self, len: usize) -> usize {
        if self.hop_size == 0 || len < self.buffer_size {
            return 0;
        }
        (len - self.buffer_size) / self.hop_size + 1
    }
}

/// Slides a fixed window over a mono signal and collects per-frame features.
///
/// Frames start at `0, hop, 2*hop, ...` and only full frames are analyzed.
/// A frame the extractor rejects is logged and left out of the track.
pub struct FrameAnalyzer {
    extractor: Box<dyn FeatureExtractor>,
    config: FrameAnalysisConfig,
}

impl FrameAnalyzer {
    pub fn new(extractor: Box<dyn FeatureExtractor>, config: FrameAnalysisConfig) -> Self {
        Self { extractor, config }
    }

    pub fn config(&self) -> &FrameAnalysisConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<FeatureTrack, FrameAnalysisError> {
        self.analyze_with_progress(samples, sample_rate, |_, _| {})
    }

    /// Like [`FrameAnalyzer::analyze`], calling `on_frame(done, total)` after
    /// each frame.
    pub fn analyze_with_progress(
        &self,
        samples: &[f32],
        sample_rate: u32,
        mut on_frame: impl FnMut(usize, usize),
    ) -> Result<FeatureTrack, FrameAnalysisError> {
        let config = &self.config;
        if config.buffer_size == 0 {
            return Err(FrameAnalysisError::ZeroBufferSize);
        }
        if config.hop_size == 0 {
            return Err(FrameAnalysisError::ZeroHopSize);
        }
        if sample_rate == 0 {
            return Err(FrameAnalysisError::ZeroSampleRate);
        }

        let frame_config = FrameConfig {
            sample_rate,
            buffer_size: config.buffer_size,
        };
        let total = config.frame_count(samples.len());
        let mut track = FeatureTrack::default();
        let mut skipped = 0usize;

        for index in 0..total {
            let offset = index * config.hop_size;
            let frame = &samples[offset..offset + config.buffer_size];
            match self.extractor.extract(frame, &frame_config) {
                Ok(features) => {
                    let spectrum =
                        features.display_spectrum(config.spectrogram_bins, config.spectrogram_scale);
                    track.push_frame(features.energy, features.mfcc, features.chroma, spectrum);
                }
                Err(e) => {
                    skipped += 1;
                    log::warn!("Skipping frame {index} at sample {offset}: {e}");
                }
            }
            on_frame(index + 1, total);
        }

        log::debug!(
            "Analyzed {} frames ({} skipped), buffer {}, hop {}",
            track.len(),
            skipped,
            config.buffer_size,
            config.hop_size
        );
        Ok(track)
    }
}
