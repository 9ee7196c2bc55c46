use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::domain::analysis_record::{AnalysisId, Snippet};
use crate::analysis::domain::analysis_store::AnalysisStore;
use crate::audio::domain::pcm_codec::PcmCodec;
use crate::audio::domain::signal::Signal;
use crate::pipeline::analyze_audio_use_case::now_millis;
use crate::pipeline::output_layout::OutputLayout;
use crate::pipeline::pipeline_logger::{timed, PipelineLogger};
use crate::shared::sample_segment::SampleSegment;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnippetError {
    #[error("invalid snippet range: need 0 <= start < end (got {start}..{end})")]
    InvalidRange { start: f64, end: f64 },
    #[error("playback speed must be positive (got {0})")]
    InvalidSpeed(f64),
    #[error("snippet range {start}..{end} lies outside the {duration:.3}s of audio")]
    EmptyRange { start: f64, end: f64, duration: f64 },
    #[error("analysis {id} has no {which} audio path")]
    MissingAudio { id: AnalysisId, which: &'static str },
}

/// What to cut out of an analysis.
#[derive(Clone, Debug, PartialEq)]
pub struct SnippetRequest {
    pub start: f64,
    pub end: f64,
    pub playback_speed: Option<f64>,
    pub annotation: Option<String>,
}

/// A stored snippet together with where its files live.
#[derive(Clone, Debug, PartialEq)]
pub struct ListedSnippet {
    pub analysis_id: AnalysisId,
    pub snippet: Snippet,
    pub path: PathBuf,
    pub forward_path: PathBuf,
}

/// Cuts, lists and deletes forward/reversed snippet pairs.
pub struct SnippetUseCase {
    codec: Box<dyn PcmCodec>,
    store: Box<dyn AnalysisStore>,
    layout: OutputLayout,
}

impl SnippetUseCase {
    pub fn new(
        codec: Box<dyn PcmCodec>,
        store: Box<dyn AnalysisStore>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            codec,
            store,
            layout,
        }
    }

    /// Cut `[start, end)` seconds from both the reversed and the original
    /// audio of analysis `id` and record the pair on the analysis.
    pub fn extract(
        &self,
        id: AnalysisId,
        request: &SnippetRequest,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Snippet, Box<dyn std::error::Error>> {
        let SnippetRequest { start, end, .. } = *request;
        if !(start.is_finite() && end.is_finite() && start >= 0.0 && start < end) {
            return Err(SnippetError::InvalidRange { start, end }.into());
        }
        let playback_speed = request.playback_speed.unwrap_or(1.0);
        if !(playback_speed.is_finite() && playback_speed > 0.0) {
            return Err(SnippetError::InvalidSpeed(playback_speed).into());
        }

        let mut record = self.store.load(id)?;
        let reversed_path = record
            .reversed_audio_path
            .clone()
            .ok_or(SnippetError::MissingAudio {
                id,
                which: "reversed",
            })?;
        let original_path = record
            .original_audio_path
            .clone()
            .ok_or(SnippetError::MissingAudio {
                id,
                which: "original",
            })?;

        let reversed = timed(logger, "decode", || self.read_signal(&reversed_path))?;
        let original = timed(logger, "decode", || self.read_signal(&original_path))?;
        let reversed_cut = cut(&reversed, start, end)?;
        let forward_cut = cut(&original, start, end)?;

        let snippets_dir = self.layout.snippets_dir();
        fs::create_dir_all(&snippets_dir)?;
        let stamp = free_stamp(&snippets_dir, now_millis());
        let file = format!("snippet_{stamp}.wav");
        let forward_file = format!("forward_snippet_{stamp}.wav");

        timed(logger, "encode", || -> Result<(), Box<dyn std::error::Error>> {
            fs::write(snippets_dir.join(&file), self.codec.encode(&reversed_cut)?)?;
            fs::write(snippets_dir.join(&forward_file), self.codec.encode(&forward_cut)?)?;
            Ok(())
        })?;

        let snippet = Snippet {
            file,
            forward_file,
            start,
            end: end.min(reversed.duration()),
            annotation: request.annotation.clone().unwrap_or_default(),
            playback_speed,
        };
        record.add_snippet(snippet.clone());
        self.store.save(id, &record)?;

        logger.info(&format!(
            "Snippet {} ({:.3}s..{:.3}s) saved for analysis {id}",
            snippet.file, snippet.start, snippet.end
        ));
        Ok(snippet)
    }

    /// Every snippet whose two files still exist, across all analyses.
    ///
    /// Analyses that cannot be read are skipped with a warning.
    pub fn list(&self) -> Result<Vec<ListedSnippet>, Box<dyn std::error::Error>> {
        let snippets_dir = self.layout.snippets_dir();
        let mut listed = Vec::new();
        for id in self.store.ids()? {
            let record = match self.store.load(id) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping analysis {id}: {e}");
                    continue;
                }
            };
            for snippet in record.snippets {
                let path = snippets_dir.join(&snippet.file);
                let forward_path = snippets_dir.join(&snippet.forward_file);
                if !path.is_file() || !forward_path.is_file() {
                    log::warn!(
                        "Snippet {} or {} is missing on disk",
                        snippet.file,
                        snippet.forward_file
                    );
                    continue;
                }
                listed.push(ListedSnippet {
                    analysis_id: id,
                    snippet,
                    path,
                    forward_path,
                });
            }
        }
        Ok(listed)
    }

    /// Remove the snippet stored under `file` from analysis `id` and delete
    /// both of its files if they are still there.
    pub fn delete(
        &self,
        id: AnalysisId,
        file: &str,
    ) -> Result<Snippet, Box<dyn std::error::Error>> {
        let mut record = self.store.load(id)?;
        let removed = record.remove_snippet(file)?;
        self.store.save(id, &record)?;

        let snippets_dir = self.layout.snippets_dir();
        for name in [&removed.file, &removed.forward_file] {
            if let Err(e) = fs::remove_file(snippets_dir.join(name)) {
                log::debug!("Could not delete {name}: {e}");
            }
        }
        Ok(removed)
    }

    fn read_signal(&self, path: &Path) -> Result<Signal, Box<dyn std::error::Error>> {
        let bytes = fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(self.codec.decode(&bytes)?)
    }
}

/// `[start, end)` seconds of `signal`, with `end` clamped to its length.
fn cut(signal: &Signal, start: f64, end: f64) -> Result<Signal, SnippetError> {
    let from = signal.sample_index_at_time(start);
    let to = signal.sample_index_at_time(end).min(signal.len());
    let range =
        SampleSegment::within(from, to, signal.len()).map_err(|_| SnippetError::EmptyRange {
            start,
            end,
            duration: signal.duration(),
        })?;
    Ok(signal.slice(range))
}

/// Smallest stamp at or after `candidate` not used by any snippet file.
fn free_stamp(dir: &Path, candidate: u64) -> u64 {
    let mut stamp = candidate;
    while dir.join(format!("snippet_{stamp}.wav")).exists()
        || dir.join(format!("forward_snippet_{stamp}.wav")).exists()
    {
        stamp += 1;
    }
    stamp
}
