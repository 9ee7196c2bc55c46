use std::fs;
use std::io;
use std::path::PathBuf;

/// Directory layout of everything the tool writes.
///
/// ```text
/// <root>/uploads    inputs converted to WAV
/// <root>/reversed   reversed audio and analysis_<id>.json records
/// <root>/snippets   snippet_<stamp>.wav / forward_snippet_<stamp>.wav
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn reversed_dir(&self) -> PathBuf {
        self.root.join("reversed")
    }

    pub fn snippets_dir(&self) -> PathBuf {
        self.root.join("snippets")
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [self.uploads_dir(), self.reversed_dir(), self.snippets_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
