use thiserror::Error;

use crate::shared::sample_segment::SampleSegment;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal must have at least one channel")]
    NoChannels,
    #[error("sample rate must be positive")]
    InvalidSampleRate,
    #[error("channel {channel} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },
}

/// Decoded PCM audio: planar channels of equal length, samples in [-1.0, 1.0].
///
/// A `Signal` is never edited in place by the processing code; operations
/// return a new signal so the decoded original stays available.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl Signal {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, SignalError> {
        if sample_rate == 0 {
            return Err(SignalError::InvalidSampleRate);
        }
        let expected = match channels.first() {
            Some(first) => first.len(),
            None => return Err(SignalError::NoChannels),
        };
        if let Some((channel, actual)) = channels
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != expected)
        {
            return Err(SignalError::ChannelLengthMismatch {
                channel,
                expected,
                actual,
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, SignalError> {
        Self::new(vec![samples], sample_rate)
    }

    /// Build from interleaved frames (`L R L R ...`). Trailing samples that do
    /// not fill a whole frame are dropped.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, SignalError> {
        if channel_count == 0 {
            return Err(SignalError::NoChannels);
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.channel_count());
        for i in 0..self.len() {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// The first channel. Always present by construction.
    pub fn first_channel(&self) -> &[f32] {
        &self.channels[0]
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Nearest sample index to `time`; negative times map to zero.
    pub fn sample_index_at_time(&self, time: f64) -> usize {
        (time.max(0.0) * self.sample_rate as f64).round() as usize
    }

    /// Average all channels into one.
    pub fn to_mono(&self) -> Signal {
        if self.channel_count() == 1 {
            return self.clone();
        }
        let scale = 1.0 / self.channel_count() as f32;
        let mixed = (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect();
        Signal {
            channels: vec![mixed],
            sample_rate: self.sample_rate,
        }
    }

    /// Copy out `[start, end)` of every channel.
    pub fn slice(&self, range: SampleSegment) -> Signal {
        let channels = self
            .channels
            .iter()
            .map(|c| c[range.start()..range.end()].to_vec())
            .collect();
        Signal {
            channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Copy the signal and edit every channel of the copy in place.
    pub fn map_channels(&self, mut edit: impl FnMut(&mut [f32])) -> Signal {
        let mut channels = self.channels.clone();
        for channel in channels.iter_mut() {
            edit(channel);
        }
        Signal {
            channels,
            sample_rate: self.sample_rate,
        }
    }
}
