use std::io::Cursor;

use crate::audio::domain::pcm_codec::{CodecError, PcmCodec};
use crate::audio::domain::signal::Signal;

/// Sample encoding used when writing WAV output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WavSampleFormat {
    /// 16-bit signed PCM (the most widely playable form).
    Int16,
    /// 32-bit IEEE float, lossless for the in-memory representation.
    Float32,
}

/// RIFF/WAVE codec backed by `hound`.
///
/// Decoding accepts any integer bit depth up to 32 bits and 32-bit float,
/// with any channel count.
pub struct WavCodec {
    format: WavSampleFormat,
}

impl WavCodec {
    pub fn new() -> Self {
        Self {
            format: WavSampleFormat::Int16,
        }
    }

    pub fn with_format(mut self, format: WavSampleFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for WavCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmCodec for WavCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Signal, CodecError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| CodecError::Decode(e.to_string()))?,
            hound::SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                if bits == 0 || bits > 32 {
                    return Err(CodecError::Decode(format!(
                        "unsupported bits per sample: {bits}"
                    )));
                }
                let full_scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| CodecError::Decode(e.to_string()))?
            }
        };

        log::debug!(
            "Decoded WAV: {} Hz, {} channels, {} bits, {} samples",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            samples.len()
        );

        Signal::from_interleaved(&samples, spec.channels as usize, spec.sample_rate)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(&self, signal: &Signal) -> Result<Vec<u8>, CodecError> {
        let channels = u16::try_from(signal.channel_count()).map_err(|_| {
            CodecError::Encode(format!("too many channels: {}", signal.channel_count()))
        })?;
        let (bits_per_sample, sample_format) = match self.format {
            WavSampleFormat::Int16 => (16, hound::SampleFormat::Int),
            WavSampleFormat::Float32 => (32, hound::SampleFormat::Float),
        };
        let spec = hound::WavSpec {
            channels,
            sample_rate: signal.sample_rate(),
            bits_per_sample,
            sample_format,
        };

        let mut buffer = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
            for sample in signal.to_interleaved() {
                let result = match self.format {
                    WavSampleFormat::Int16 => writer.write_sample(to_i16(sample)),
                    WavSampleFormat::Float32 => writer.write_sample(sample),
                };
                result.map_err(|e| CodecError::Encode(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| CodecError::Encode(e.to_string()))?;
        }
        Ok(buffer)
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
