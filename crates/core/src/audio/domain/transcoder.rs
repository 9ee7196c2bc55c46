use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("transcoder executable not found: {0}")]
    NotFound(String),
    #[error("transcoding {input} failed (exit code {code:?}): {message}")]
    Failed {
        input: PathBuf,
        code: Option<i32>,
        message: String,
    },
    #[error("transcoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How audio is pulled out of an arbitrary container into PCM WAV.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractOptions {
    /// Downmix/upmix to this many channels. `None` keeps the source layout.
    pub channels: Option<u16>,
    /// Resample to this rate. `None` keeps the source rate.
    pub sample_rate: Option<u32>,
    /// Reverse the whole track end to end while extracting.
    pub reverse: bool,
}

/// Domain interface for the external transcoding collaborator.
///
/// Implementations own container and codec handling; the audio core only
/// ever sees WAV bytes.
pub trait Transcoder: Send + Sync {
    /// Write the audio track of `input` to `output` as PCM WAV.
    fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        options: &ExtractOptions,
    ) -> Result<(), TranscodeError>;

    /// Write `output` with the video stream of `video` and the audio of `audio`.
    fn replace_audio(&self, video: &Path, audio: &Path, output: &Path)
        -> Result<(), TranscodeError>;
}
