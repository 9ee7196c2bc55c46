use std::fs;
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::analysis::domain::analysis_record::{AnalysisId, AnalysisRecord};
use crate::analysis::domain::analysis_store::{allocate_id, AnalysisStore};
use crate::analysis::domain::frame_analyzer::FrameAnalyzer;
use crate::audio::domain::pcm_codec::PcmCodec;
use crate::pipeline::output_layout::OutputLayout;
use crate::pipeline::pipeline_logger::{timed, PipelineLogger};
use crate::shared::constants::FORMANT_SUMMARY_LEN;
use crate::speech::domain::segment_reverser;

pub struct AnalysisOutcome {
    pub id: AnalysisId,
    pub record: AnalysisRecord,
}

/// Reverse an upload end to end, extract frame features from the reversed
/// audio and persist the result as a new analysis record.
///
/// Segments are not detected here; the record starts with none and is
/// filled in by redetection.
pub struct AnalyzeAudioUseCase {
    codec: Box<dyn PcmCodec>,
    analyzer: FrameAnalyzer,
    store: Box<dyn AnalysisStore>,
    layout: OutputLayout,
}

impl AnalyzeAudioUseCase {
    pub fn new(
        codec: Box<dyn PcmCodec>,
        analyzer: FrameAnalyzer,
        store: Box<dyn AnalysisStore>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            codec,
            analyzer,
            store,
            layout,
        }
    }

    pub fn run(
        &self,
        input_path: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<AnalysisOutcome, Box<dyn std::error::Error>> {
        let bytes = fs::read(input_path)?;
        let signal = timed(logger, "decode", || self.codec.decode(&bytes))?;
        let reversed = timed(logger, "reverse", || {
            segment_reverser::reverse_all(&signal.to_mono())
        });

        let id = allocate_id(&*self.store, now_millis());
        let reversed_path = self.layout.reversed_dir().join(format!("reversed_{id}.wav"));
        let encoded = timed(logger, "encode", || self.codec.encode(&reversed))?;
        fs::create_dir_all(self.layout.reversed_dir())?;
        fs::write(&reversed_path, encoded)?;

        let started = Instant::now();
        let track = self.analyzer.analyze_with_progress(
            reversed.first_channel(),
            reversed.sample_rate(),
            |done, total| logger.progress(done, total),
        )?;
        logger.stage("features", started.elapsed());
        logger.count("frames", track.len());

        let record = AnalysisRecord {
            formants: track.formant_summary(FORMANT_SUMMARY_LEN),
            normalized_energy_values: Some(track.normalized_energies()),
            normalized_formant_shifts: Some(track.normalized_formant_shifts()),
            hop_size: Some(self.analyzer.config().hop_size),
            sample_rate: Some(reversed.sample_rate()),
            duration: reversed.duration(),
            original_audio_path: Some(
                fs::canonicalize(input_path).unwrap_or_else(|_| input_path.to_path_buf()),
            ),
            reversed_audio_path: Some(reversed_path.clone()),
            mfcc: track.mfcc,
            spectrogram: track.spectrogram,
            ..Default::default()
        };
        timed(logger, "persist", || self.store.save(id, &record))?;

        logger.info(&format!(
            "Analysis {id}: {} frames over {:.2}s, reversed audio at {}",
            record.mfcc.len(),
            record.duration,
            reversed_path.display()
        ));
        Ok(AnalysisOutcome { id, record })
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::frame_analyzer::FrameAnalysisConfig;
    use crate::analysis::infrastructure::json_analysis_store::JsonAnalysisStore;
    use crate::analysis::infrastructure::spectral_feature_extractor::SpectralFeatureExtractor;
    use crate::audio::domain::signal::Signal;
    use crate::audio::infrastructure::wav_codec::{WavCodec, WavSampleFormat};
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StdoutPipelineLogger};

    fn use_case(root: &Path) -> AnalyzeAudioUseCase {
        let layout = OutputLayout::new(root);
        AnalyzeAudioUseCase::new(
            Box::new(WavCodec::new().with_format(WavSampleFormat::Float32)),
            FrameAnalyzer::new(
                Box::new(SpectralFeatureExtractor::new()),
                FrameAnalysisConfig::default(),
            ),
            Box::new(JsonAnalysisStore::new(layout.reversed_dir())),
            layout,
        )
    }

    fn write_ramp(path: &Path, len: usize) {
        let left: Vec<f32> = (0..len).map(|i| i as f32 / len as f32).collect();
        let right = vec![0.0; len];
        let sig = Signal::new(vec![left, right], 8000).unwrap();
        let codec = WavCodec::new().with_format(WavSampleFormat::Float32);
        fs::write(path, codec.encode(&sig).unwrap()).unwrap();
    }

    #[test]
    fn test_analysis_persists_record_and_reversed_audio() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("upload.wav");
        write_ramp(&input, 2048);
        let use_case = use_case(&dir.path().join("outputs"));

        let mut logger = StdoutPipelineLogger::default();
        let outcome = use_case.run(&input, &mut logger).unwrap();
        let record = &outcome.record;

        // (2048 - 512) / 256 + 1 frames.
        assert_eq!(record.mfcc.len(), 7);
        assert_eq!(record.spectrogram.len(), 7);
        assert!(record.spectrogram.iter().all(|row| row.len() == 128));
        assert_eq!(record.normalized_energy_values.as_ref().unwrap().len(), 7);
        assert_eq!(record.normalized_formant_shifts.as_ref().unwrap().len(), 6);
        assert_eq!(record.formants.len(), 5);
        assert!(record.detected_segments.is_empty());
        assert_eq!(record.hop_size, Some(256));
        assert_eq!(record.sample_rate, Some(8000));
        assert_eq!(record.duration, 0.256);
        assert_eq!(logger.count_for("frames"), Some(7));

        let stored = JsonAnalysisStore::new(dir.path().join("outputs").join("reversed"))
            .load(outcome.id)
            .unwrap();
        assert_eq!(&stored, record);

        let reversed = WavCodec::new()
            .decode(&fs::read(record.reversed_audio_path.as_ref().unwrap()).unwrap())
            .unwrap();
        assert_eq!(reversed.channel_count(), 1);
        assert_eq!(reversed.len(), 2048);
        // Mono mix of (ramp, 0) reversed: loudest sample first.
        assert!(reversed.first_channel()[0] > reversed.first_channel()[2047]);
    }

    #[test]
    fn test_energy_series_reflects_reversed_signal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ramp.wav");
        write_ramp(&input, 4096);
        let outcome = use_case(dir.path())
            .run(&input, &mut NullPipelineLogger)
            .unwrap();
        let energies = outcome.record.normalized_energy_values.unwrap();
        // The ramp is reversed, so energy falls over time and the first frame is the peak.
        assert_eq!(energies.values()[0], 1.0);
        assert!(energies.values().windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_consecutive_runs_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.wav");
        write_ramp(&input, 1024);
        let use_case = use_case(dir.path());
        let first = use_case.run(&input, &mut NullPipelineLogger).unwrap();
        let second = use_case.run(&input, &mut NullPipelineLogger).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(use_case(dir.path())
            .run(&dir.path().join("nope.wav"), &mut NullPipelineLogger)
            .is_err());
    }
}
