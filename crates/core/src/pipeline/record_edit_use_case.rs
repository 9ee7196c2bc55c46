use crate::analysis::domain::analysis_record::{
    AnalysisId, AnalysisRecord, Marker, MarkerId, MarkerUpdate,
};
use crate::analysis::domain::analysis_store::AnalysisStore;
use crate::shared::constants::MARKER_SEARCH_RADIUS;

/// Annotation and marker edits on stored analyses.
///
/// Every mutating call loads the record, applies one change and saves it
/// back. A failed change leaves the stored record untouched.
pub struct RecordEditUseCase {
    store: Box<dyn AnalysisStore>,
}

impl RecordEditUseCase {
    pub fn new(store: Box<dyn AnalysisStore>) -> Self {
        Self { store }
    }

    pub fn annotate_segment(
        &self,
        id: AnalysisId,
        index: usize,
        text: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.edit(id, |record| Ok(record.annotate_segment(index, text)?))
    }

    pub fn annotate_snippet(
        &self,
        id: AnalysisId,
        index: usize,
        text: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.edit(id, |record| Ok(record.annotate_snippet(index, text)?))
    }

    pub fn add_marker(
        &self,
        id: AnalysisId,
        timestamp: f64,
        label: &str,
        color: Option<&str>,
    ) -> Result<Marker, Box<dyn std::error::Error>> {
        let marker = self.edit(id, |record| {
            Ok(record.add_marker(timestamp, label, color)?.clone())
        })?;
        log::debug!("Analysis {id}: added marker {} at {:.3}s", marker.id, marker.timestamp);
        Ok(marker)
    }

    pub fn update_marker(
        &self,
        id: AnalysisId,
        marker_id: MarkerId,
        update: MarkerUpdate,
    ) -> Result<Marker, Box<dyn std::error::Error>> {
        self.edit(id, |record| Ok(record.update_marker(marker_id, update)?.clone()))
    }

    pub fn remove_marker(
        &self,
        id: AnalysisId,
        marker_id: MarkerId,
    ) -> Result<Marker, Box<dyn std::error::Error>> {
        self.edit(id, |record| Ok(record.remove_marker(marker_id)?))
    }

    /// Markers of analysis `id` in timestamp order.
    pub fn markers(&self, id: AnalysisId) -> Result<Vec<Marker>, Box<dyn std::error::Error>> {
        let record = self.store.load(id)?;
        Ok(record.sorted_markers().into_iter().cloned().collect())
    }

    /// The marker closest to `timestamp`, if one lies within the search radius.
    pub fn nearest_marker(
        &self,
        id: AnalysisId,
        timestamp: f64,
    ) -> Result<Option<Marker>, Box<dyn std::error::Error>> {
        let record = self.store.load(id)?;
        Ok(record
            .nearest_marker(timestamp, MARKER_SEARCH_RADIUS)
            .cloned())
    }

    fn edit<T>(
        &self,
        id: AnalysisId,
        change: impl FnOnce(&mut AnalysisRecord) -> Result<T, Box<dyn std::error::Error>>,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let mut record = self.store.load(id)?;
        let result = change(&mut record)?;
        self.store.save(id, &record)?;
        Ok(result)
    }
}
