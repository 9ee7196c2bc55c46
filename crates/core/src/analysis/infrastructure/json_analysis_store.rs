use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::analysis::domain::analysis_record::{AnalysisId, AnalysisRecord};
use crate::analysis::domain::analysis_store::{AnalysisStore, StoreError};

const FILE_PREFIX: &str = "analysis_";
const FILE_SUFFIX: &str = ".json";

/// Stores each record as pretty-printed `analysis_<id>.json` in one directory.
pub struct JsonAnalysisStore {
    dir: PathBuf,
}

impl JsonAnalysisStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: AnalysisId) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }
}

fn parse_id(file_name: &str) -> Option<AnalysisId> {
    file_name
        .strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

impl AnalysisStore for JsonAnalysisStore {
    fn load(&self, id: AnalysisId) -> Result<AnalysisRecord, StoreError> {
        let bytes = match fs::read(self.path_for(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
            id,
            message: e.to_string(),
        })
    }

    fn save(&self, id: AnalysisId, record: &AnalysisRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Malformed {
            id,
            message: e.to_string(),
        })?;
        // Write beside the target and rename so readers never see a partial file.
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        log::debug!("Saved analysis {id} to {}", path.display());
        Ok(())
    }

    fn contains(&self, id: AnalysisId) -> bool {
        self.path_for(id).is_file()
    }

    fn remove(&self, id: AnalysisId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => {
                log::debug!("Removed analysis {id}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    fn ids(&self) -> Result<Vec<AnalysisId>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(parse_id) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}
