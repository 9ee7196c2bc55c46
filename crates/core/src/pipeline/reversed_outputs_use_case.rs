use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::domain::analysis_record::AnalysisId;
use crate::analysis::domain::analysis_store::{AnalysisStore, StoreError};
use crate::pipeline::output_layout::OutputLayout;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "aac", "flac", "m4a"];

#[derive(Error, Debug)]
pub enum ReversedOutputError {
    #[error("no reversed output or analysis {0}")]
    NotFound(String),
    #[error("not a plain file name: {0}")]
    InvalidFileName(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("reversed output I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One audio file in the reversed directory.
#[derive(Clone, Debug, PartialEq)]
pub struct ReversedOutput {
    pub file: String,
    pub path: PathBuf,
    /// The analysis whose reversed audio this is, if any.
    pub analysis_id: Option<AnalysisId>,
}

/// Lists and deletes reversed audio together with the analyses that own it.
pub struct ReversedOutputsUseCase {
    store: Box<dyn AnalysisStore>,
    layout: OutputLayout,
}

impl ReversedOutputsUseCase {
    pub fn new(store: Box<dyn AnalysisStore>, layout: OutputLayout) -> Self {
        Self { store, layout }
    }

    /// Audio files in the reversed directory, sorted by name.
    pub fn list(&self) -> Result<Vec<ReversedOutput>, ReversedOutputError> {
        let dir = self.layout.reversed_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let owners = self.owners()?;
        let mut outputs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_audio(&path) {
                continue;
            }
            let Some(file) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            outputs.push(ReversedOutput {
                file: file.to_string(),
                analysis_id: owners.get(file).copied(),
                path,
            });
        }
        outputs.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(outputs)
    }

    /// Delete analysis `id`: its reversed audio, every snippet pair it
    /// recorded and the record itself. Returns the files that were removed.
    ///
    /// The original upload is left alone.
    pub fn delete(&self, id: AnalysisId) -> Result<Vec<PathBuf>, ReversedOutputError> {
        let record = match self.store.load(id) {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                return Err(ReversedOutputError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let snippets_dir = self.layout.snippets_dir();
        let mut doomed: Vec<PathBuf> = record.reversed_audio_path.into_iter().collect();
        for snippet in &record.snippets {
            doomed.push(snippets_dir.join(&snippet.file));
            doomed.push(snippets_dir.join(&snippet.forward_file));
        }

        let mut removed = Vec::new();
        for path in doomed {
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(e) => log::debug!("Could not delete {}: {e}", path.display()),
            }
        }
        self.store.remove(id)?;
        log::info!("Deleted analysis {id} ({} files)", removed.len());
        Ok(removed)
    }

    /// Delete the reversed output named `file`. When an analysis owns it the
    /// whole analysis goes, as with [`ReversedOutputsUseCase::delete`].
    pub fn delete_file(&self, file: &str) -> Result<Vec<PathBuf>, ReversedOutputError> {
        let is_plain = Path::new(file).file_name().and_then(|n| n.to_str()) == Some(file);
        if !is_plain {
            return Err(ReversedOutputError::InvalidFileName(file.to_string()));
        }
        if let Some(&id) = self.owners()?.get(file) {
            return self.delete(id);
        }
        let path = self.layout.reversed_dir().join(file);
        if !path.is_file() {
            return Err(ReversedOutputError::NotFound(file.to_string()));
        }
        fs::remove_file(&path)?;
        log::info!("Deleted {}", path.display());
        Ok(vec![path])
    }

    /// Reversed file name -> owning analysis. Unreadable records are skipped.
    fn owners(&self) -> Result<HashMap<String, AnalysisId>, ReversedOutputError> {
        let mut owners = HashMap::new();
        for id in self.store.ids()? {
            let record = match self.store.load(id) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping analysis {id}: {e}");
                    continue;
                }
            };
            let name = record
                .reversed_audio_path
                .as_deref()
                .and_then(Path::file_name)
                .and_then(|n| n.to_str());
            if let Some(name) = name {
                owners.insert(name.to_string(), id);
            }
        }
        Ok(owners)
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::analysis_record::{AnalysisRecord, Snippet};
    use crate::analysis::infrastructure::json_analysis_store::JsonAnalysisStore;
    use rstest::rstest;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: OutputLayout,
    }

    /// Analysis 7 owns reversed_7.wav and one snippet pair; standalone.wav
    /// and notes.txt belong to nobody.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.ensure_dirs().unwrap();

        let upload = layout.uploads_dir().join("upload_7.wav");
        let reversed = layout.reversed_dir().join("reversed_7.wav");
        fs::write(&upload, b"forward").unwrap();
        fs::write(&reversed, b"reversed").unwrap();
        fs::write(layout.reversed_dir().join("standalone.wav"), b"other").unwrap();
        fs::write(layout.reversed_dir().join("notes.txt"), b"text").unwrap();
        fs::write(layout.snippets_dir().join("snippet_5.wav"), b"s").unwrap();
        fs::write(layout.snippets_dir().join("forward_snippet_5.wav"), b"f").unwrap();

        let record = AnalysisRecord {
            original_audio_path: Some(upload),
            reversed_audio_path: Some(reversed),
            snippets: vec![Snippet {
                file: "snippet_5.wav".to_string(),
                forward_file: "forward_snippet_5.wav".to_string(),
                start: 0.0,
                end: 0.5,
                annotation: String::new(),
                playback_speed: 1.0,
            }],
            ..Default::default()
        };
        JsonAnalysisStore::new(layout.reversed_dir())
            .save(7, &record)
            .unwrap();
        Fixture { _dir: dir, layout }
    }

    fn use_case(layout: &OutputLayout) -> ReversedOutputsUseCase {
        ReversedOutputsUseCase::new(
            Box::new(JsonAnalysisStore::new(layout.reversed_dir())),
            layout.clone(),
        )
    }

    #[test]
    fn test_list_returns_audio_files_with_owners() {
        let fx = fixture();
        let listed = use_case(&fx.layout).list().unwrap();
        let summary: Vec<(&str, Option<AnalysisId>)> = listed
            .iter()
            .map(|o| (o.file.as_str(), o.analysis_id))
            .collect();
        assert_eq!(
            summary,
            vec![("reversed_7.wav", Some(7)), ("standalone.wav", None)]
        );
        assert!(listed.iter().all(|o| o.path.is_file()));
    }

    #[test]
    fn test_list_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("nothing"));
        assert!(use_case(&layout).list().unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_audio_record_and_snippets() {
        let fx = fixture();
        let use_case = use_case(&fx.layout);
        let removed = use_case.delete(7).unwrap();

        assert_eq!(removed.len(), 3);
        assert!(!fx.layout.reversed_dir().join("reversed_7.wav").exists());
        assert!(!fx.layout.reversed_dir().join("analysis_7.json").exists());
        assert!(!fx.layout.snippets_dir().join("snippet_5.wav").exists());
        assert!(!fx.layout.snippets_dir().join("forward_snippet_5.wav").exists());
        assert!(fx.layout.uploads_dir().join("upload_7.wav").is_file());
        assert!(fx.layout.reversed_dir().join("standalone.wav").is_file());
        assert!(matches!(
            use_case.delete(7),
            Err(ReversedOutputError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_tolerates_already_missing_files() {
        let fx = fixture();
        fs::remove_file(fx.layout.snippets_dir().join("snippet_5.wav")).unwrap();
        let removed = use_case(&fx.layout).delete(7).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!fx.layout.reversed_dir().join("analysis_7.json").exists());
    }

    #[test]
    fn test_delete_file_of_owned_output_drops_the_analysis() {
        let fx = fixture();
        use_case(&fx.layout).delete_file("reversed_7.wav").unwrap();
        assert!(!fx.layout.reversed_dir().join("analysis_7.json").exists());
        assert!(!fx.layout.snippets_dir().join("snippet_5.wav").exists());
    }

    #[test]
    fn test_delete_file_of_standalone_output() {
        let fx = fixture();
        let use_case = use_case(&fx.layout);
        let removed = use_case.delete_file("standalone.wav").unwrap();
        assert_eq!(removed, vec![fx.layout.reversed_dir().join("standalone.wav")]);
        assert!(fx.layout.reversed_dir().join("analysis_7.json").is_file());
        let names: Vec<String> = use_case.list().unwrap().into_iter().map(|o| o.file).collect();
        assert_eq!(names, vec!["reversed_7.wav".to_string()]);
    }

    #[rstest]
    #[case::parent_dir("../uploads/upload_7.wav")]
    #[case::nested("sub/standalone.wav")]
    #[case::dot_dot("..")]
    fn test_delete_file_rejects_paths(#[case] file: &str) {
        let fx = fixture();
        assert!(matches!(
            use_case(&fx.layout).delete_file(file),
            Err(ReversedOutputError::InvalidFileName(_))
        ));
        assert!(fx.layout.uploads_dir().join("upload_7.wav").is_file());
    }

    #[test]
    fn test_delete_file_missing() {
        let fx = fixture();
        assert!(matches!(
            use_case(&fx.layout).delete_file("gone.wav"),
            Err(ReversedOutputError::NotFound(_))
        ));
    }

    #[rstest]
    #[case::wav("a.wav", true)]
    #[case::upper_case("a.FLAC", true)]
    #[case::m4a("a.m4a", true)]
    #[case::json("analysis_1.json", false)]
    #[case::no_extension("wav", false)]
    fn test_is_audio(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_audio(Path::new(name)), expected);
    }
}
