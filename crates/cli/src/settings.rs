use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backmask_core::analysis::domain::frame_analyzer::FrameAnalysisConfig;
use backmask_core::analysis::domain::segment_detector::DetectionThresholds;
use backmask_core::pipeline::reverse_audio_use_case::ReverseMode;
use backmask_core::speech::domain::speech_segmenter_config::SpeechSegmenterConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    /// Reverse the whole file end to end.
    Global,
    /// Reverse each detected speech region in place.
    Segment,
}

impl From<ModeSetting> for ReverseMode {
    fn from(mode: ModeSetting) -> Self {
        match mode {
            ModeSetting::Global => ReverseMode::Global,
            ModeSetting::Segment => ReverseMode::SegmentLocal,
        }
    }
}

impl std::fmt::Display for ModeSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeSetting::Global => write!(f, "global"),
            ModeSetting::Segment => write!(f, "segment"),
        }
    }
}

/// User defaults persisted between runs. Command-line flags win over these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of uploads/, reversed/ and snippets/. `None` means the data dir.
    pub output_dir: Option<PathBuf>,
    pub mode: ModeSetting,
    /// Batch worker threads. `None` means one per CPU.
    pub workers: Option<usize>,
    pub segmenter: SpeechSegmenterConfig,
    pub analysis: FrameAnalysisConfig,
    pub thresholds: DetectionThresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: None,
            mode: ModeSetting::Segment,
            workers: None,
            segmenter: SpeechSegmenterConfig::default(),
            analysis: FrameAnalysisConfig::default(),
            thresholds: DetectionThresholds::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Backmask").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or malformed files yield the defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed settings at {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save(&self) -> io::Result<PathBuf> {
        let path = Self::config_path()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no config directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("Backmask"))
                .unwrap_or_else(|| PathBuf::from("outputs"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Settings::load_from(&dir.path().join("settings.json")),
            Settings::default()
        );
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"mode": "global", "thresholds": {"energy": 0.3}, "segmenter": {"frame_size": 512}}"#,
        )
        .unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.mode, ModeSetting::Global);
        assert_eq!(settings.thresholds.energy, 0.3);
        assert_eq!(
            settings.thresholds.formant_shift,
            DetectionThresholds::default().formant_shift
        );
        assert_eq!(settings.segmenter.frame_size, 512);
        assert_eq!(settings.analysis, FrameAnalysisConfig::default());
        assert_eq!(settings.workers, None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            output_dir: Some(PathBuf::from("/tmp/backmask")),
            workers: Some(3),
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_explicit_output_dir_wins() {
        let settings = Settings {
            output_dir: Some(PathBuf::from("here")),
            ..Default::default()
        };
        assert_eq!(settings.resolved_output_dir(), PathBuf::from("here"));
    }

    #[test]
    fn test_mode_maps_to_reverse_mode() {
        assert_eq!(ReverseMode::from(ModeSetting::Global), ReverseMode::Global);
        assert_eq!(
            ReverseMode::from(ModeSetting::Segment),
            ReverseMode::SegmentLocal
        );
    }
}
