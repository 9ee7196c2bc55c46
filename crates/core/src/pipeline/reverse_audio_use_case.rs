use std::fs;
use std::path::Path;

use crate::audio::domain::pcm_codec::PcmCodec;
use crate::audio::domain::signal::Signal;
use crate::pipeline::pipeline_logger::{timed, PipelineLogger};
use crate::shared::sample_segment::SampleSegment;
use crate::shared::time_segment::TimeSegment;
use crate::speech::domain::segment_reverser;
use crate::speech::domain::speech_segmenter::SpeechSegmenter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReverseMode {
    /// Reverse the whole track end to end.
    Global,
    /// Reverse each detected speech region in place, keeping the timeline.
    #[default]
    SegmentLocal,
}

pub struct ReverseOutcome {
    pub signal: Signal,
    /// Reversed regions in seconds, in time order.
    pub segments: Vec<TimeSegment>,
}

pub struct ReverseAudioUseCase {
    codec: Box<dyn PcmCodec>,
    segmenter: SpeechSegmenter,
    mode: ReverseMode,
}

impl ReverseAudioUseCase {
    pub fn new(codec: Box<dyn PcmCodec>, segmenter: SpeechSegmenter, mode: ReverseMode) -> Self {
        Self {
            codec,
            segmenter,
            mode,
        }
    }

    /// Reverse an already decoded signal.
    pub fn reverse_signal(
        &self,
        signal: &Signal,
        logger: &mut dyn PipelineLogger,
    ) -> Result<ReverseOutcome, Box<dyn std::error::Error>> {
        let regions = match self.mode {
            ReverseMode::Global => {
                SampleSegment::new(0, signal.len()).map_or_else(|_| Vec::new(), |s| vec![s])
            }
            ReverseMode::SegmentLocal => timed(logger, "segment", || {
                self.segmenter
                    .segment(signal.first_channel(), signal.sample_rate())
            })?,
        };
        logger.count("segments", regions.len());

        let reversed = timed(logger, "reverse", || {
            segment_reverser::reverse(signal, &regions)
        })?;

        let segments = regions
            .iter()
            .map(|r| r.to_time_segment(signal.sample_rate()))
            .collect();
        Ok(ReverseOutcome {
            signal: reversed,
            segments,
        })
    }

    /// Decode WAV bytes, reverse, and encode the result.
    pub fn reverse_bytes(
        &self,
        input: &[u8],
        logger: &mut dyn PipelineLogger,
    ) -> Result<(Vec<u8>, ReverseOutcome), Box<dyn std::error::Error>> {
        let signal = timed(logger, "decode", || self.codec.decode(input))?;
        let outcome = self.reverse_signal(&signal, logger)?;
        let bytes = timed(logger, "encode", || self.codec.encode(&outcome.signal))?;
        Ok((bytes, outcome))
    }

    pub fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<ReverseOutcome, Box<dyn std::error::Error>> {
        let input = fs::read(input_path)?;
        let (bytes, outcome) = self.reverse_bytes(&input, logger)?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, bytes)?;

        logger.info(&format!(
            "Reversed {} ({} segments, {:.2}s) -> {}",
            input_path.display(),
            outcome.segments.len(),
            outcome.signal.duration(),
            output_path.display()
        ));
        Ok(outcome)
    }
}
