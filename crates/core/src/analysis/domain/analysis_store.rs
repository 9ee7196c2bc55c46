use thiserror::Error;

use super::analysis_record::{AnalysisId, AnalysisRecord};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("analysis {0} not found")]
    NotFound(AnalysisId),
    #[error("analysis {id} is unreadable: {message}")]
    Malformed { id: AnalysisId, message: String },
    #[error("analysis store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keyed persistence for analysis records.
pub trait AnalysisStore: Send + Sync {
    fn load(&self, id: AnalysisId) -> Result<AnalysisRecord, StoreError>;

    fn save(&self, id: AnalysisId, record: &AnalysisRecord) -> Result<(), StoreError>;

    fn contains(&self, id: AnalysisId) -> bool;

    /// Drop the record for `id`. Fails with `NotFound` if there is none.
    fn remove(&self, id: AnalysisId) -> Result<(), StoreError>;

    /// Ids of all stored records, ascending.
    fn ids(&self) -> Result<Vec<AnalysisId>, StoreError>;
}

/// First id at or after `candidate` that `store` does not hold yet.
pub fn allocate_id(store: &dyn AnalysisStore, candidate: AnalysisId) -> AnalysisId {
    let mut id = candidate;
    while store.contains(id) {
        id += 1;
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    struct MemoryStore(Mutex<BTreeMap<AnalysisId, AnalysisRecord>>);

    impl AnalysisStore for MemoryStore {
        fn load(&self, id: AnalysisId) -> Result<AnalysisRecord, StoreError> {
            self.0
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        }

        fn save(&self, id: AnalysisId, record: &AnalysisRecord) -> Result<(), StoreError> {
            self.0.lock().unwrap().insert(id, record.clone());
            Ok(())
        }

        fn contains(&self, id: AnalysisId) -> bool {
            self.0.lock().unwrap().contains_key(&id)
        }

        fn remove(&self, id: AnalysisId) -> Result<(), StoreError> {
            self.0
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound(id))
        }

        fn ids(&self) -> Result<Vec<AnalysisId>, StoreError> {
            Ok(self.0.lock().unwrap().keys().copied().collect())
        }
    }

    #[test]
    fn test_allocate_id_skips_taken_ids() {
        let store = MemoryStore(Mutex::new(BTreeMap::new()));
        store.save(100, &AnalysisRecord::default()).unwrap();
        store.save(101, &AnalysisRecord::default()).unwrap();
        assert_eq!(allocate_id(&store, 100), 102);
        assert_eq!(allocate_id(&store, 50), 50);
    }
}
