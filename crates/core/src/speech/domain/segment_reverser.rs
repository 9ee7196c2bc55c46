use crate::audio::domain::signal::Signal;
use crate::shared::sample_segment::{SampleSegment, SegmentError};

/// Copy `channels` and time-reverse every segment in place on each copy.
///
/// Samples outside the segments are copied unchanged, so every output
/// channel has the length of its input channel.
pub fn reverse_channels(
    channels: &[Vec<f32>],
    segments: &[SampleSegment],
) -> Result<Vec<Vec<f32>>, SegmentError> {
    let mut output = channels.to_vec();
    for channel in output.iter_mut() {
        for segment in segments {
            segment.check_fits(channel.len())?;
            channel[segment.start()..segment.end()].reverse();
        }
    }
    Ok(output)
}

/// Segment-local reversal of a whole signal.
pub fn reverse(signal: &Signal, segments: &[SampleSegment]) -> Result<Signal, SegmentError> {
    for segment in segments {
        segment.check_fits(signal.len())?;
    }
    Ok(signal.map_channels(|channel| {
        for segment in segments {
            channel[segment.start()..segment.end()].reverse();
        }
    }))
}

/// Reverse every channel end to end.
pub fn reverse_all(signal: &Signal) -> Signal {
    signal.map_channels(|channel| channel.reverse())
}
