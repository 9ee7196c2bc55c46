use crate::analysis::domain::analysis_record::AnalysisId;
use crate::analysis::domain::analysis_store::AnalysisStore;
use crate::analysis::domain::redetector;
use crate::analysis::domain::segment_detector::DetectionThresholds;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::time_segment::TimeSegment;

/// Re-run segment detection on a stored analysis with new thresholds.
pub struct RedetectSegmentsUseCase {
    store: Box<dyn AnalysisStore>,
}

impl RedetectSegmentsUseCase {
    pub fn new(store: Box<dyn AnalysisStore>) -> Self {
        Self { store }
    }

    pub fn run(
        &self,
        id: AnalysisId,
        thresholds: &DetectionThresholds,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<TimeSegment>, Box<dyn std::error::Error>> {
        let mut record = self.store.load(id)?;
        let segments = redetector::redetect_into(&mut record, thresholds)?.to_vec();
        self.store.save(id, &record)?;

        logger.count("segments", segments.len());
        logger.info(&format!(
            "Analysis {id}: {} segments (energy > {}, formant shift > {})",
            segments.len(),
            thresholds.energy,
            thresholds.formant_shift
        ));
        Ok(segments)
    }
}
