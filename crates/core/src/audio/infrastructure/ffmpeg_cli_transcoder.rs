use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::audio::domain::transcoder::{ExtractOptions, TranscodeError, Transcoder};

pub const DEFAULT_FFMPEG_PROGRAM: &str = "ffmpeg";

/// Runs the `ffmpeg` executable to move audio in and out of containers.
pub struct FfmpegCliTranscoder {
    program: PathBuf,
}

impl FfmpegCliTranscoder {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_FFMPEG_PROGRAM),
        }
    }

    /// Use a specific ffmpeg binary instead of looking it up on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, input: &Path, args: Vec<OsString>) -> Result<(), TranscodeError> {
        log::debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    TranscodeError::NotFound(self.program.display().to_string())
                }
                _ => TranscodeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::Failed {
                input: input.to_path_buf(),
                code: output.status.code(),
                message: stderr
                    .lines()
                    .last()
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(())
    }
}

impl Default for FfmpegCliTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for FfmpegCliTranscoder {
    fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        options: &ExtractOptions,
    ) -> Result<(), TranscodeError> {
        ensure_parent(output)?;
        self.run(input, extract_args(input, output, options))?;
        log::info!("Extracted audio {} -> {}", input.display(), output.display());
        Ok(())
    }

    fn replace_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), TranscodeError> {
        ensure_parent(output)?;
        self.run(video, replace_audio_args(video, audio, output))?;
        log::info!("Muxed {} into {}", audio.display(), output.display());
        Ok(())
    }
}

/// ffmpeg does not create missing output directories.
fn ensure_parent(output: &Path) -> Result<(), TranscodeError> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

fn extract_args(input: &Path, output: &Path, options: &ExtractOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.into(),
        "-vn".into(),
    ];
    if options.reverse {
        args.extend(["-af".into(), "areverse".into()]);
    }
    if let Some(channels) = options.channels {
        args.extend(["-ac".into(), channels.to_string().into()]);
    }
    if let Some(rate) = options.sample_rate {
        args.extend(["-ar".into(), rate.to_string().into()]);
    }
    args.extend([
        "-c:a".into(),
        "pcm_s16le".into(),
        "-f".into(),
        "wav".into(),
        output.into(),
    ]);
    args
}

fn replace_audio_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        video.into(),
        "-i".into(),
        audio.into(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
        "-shortest".into(),
        output.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_extract_args_default_keeps_source_layout() {
        let args = as_strings(&extract_args(
            Path::new("in.mp4"),
            Path::new("out.wav"),
            &ExtractOptions::default(),
        ));
        assert!(args.contains(&"-vn".to_string()));
        assert!(!args.contains(&"-ac".to_string()));
        assert!(!args.contains(&"-ar".to_string()));
        assert!(!args.contains(&"areverse".to_string()));
        assert_eq!(args.last().unwrap(), "out.wav");
    }

    #[test]
    fn test_extract_args_with_all_options() {
        let options = ExtractOptions {
            channels: Some(1),
            sample_rate: Some(44100),
            reverse: true,
        };
        let args = as_strings(&extract_args(
            Path::new("in.mov"),
            Path::new("out.wav"),
            &options,
        ));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-af") + 1], "areverse");
        assert_eq!(args[pos("-ac") + 1], "1");
        assert_eq!(args[pos("-ar") + 1], "44100");
        assert_eq!(args[pos("-c:a") + 1], "pcm_s16le");
    }

    #[test]
    fn test_replace_audio_args_copies_video_stream() {
        let args = as_strings(&replace_audio_args(
            Path::new("clip.mp4"),
            Path::new("rev.wav"),
            Path::new("final.mp4"),
        ));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-c:v") + 1], "copy");
        assert!(args.contains(&"0:v:0".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert_eq!(args.last().unwrap(), "final.mp4");
    }

    #[test]
    fn test_missing_program_reports_not_found() {
        let transcoder = FfmpegCliTranscoder::with_program("/nonexistent/bin/ffmpeg-missing");
        let err = transcoder
            .extract_audio(
                Path::new("in.mp4"),
                Path::new("out.wav"),
                &ExtractOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, TranscodeError::NotFound(_)));
    }

    #[test]
    fn test_replace_audio_creates_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("videos").join("final.mp4");
        let transcoder = FfmpegCliTranscoder::with_program("/nonexistent/bin/ffmpeg-missing");
        let err = transcoder
            .replace_audio(Path::new("clip.mp4"), Path::new("rev.wav"), &output)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::NotFound(_)));
        assert!(output.parent().unwrap().is_dir());
    }
}
