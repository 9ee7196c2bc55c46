use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::pipeline::reverse_audio_use_case::ReverseAudioUseCase;

/// One file to reverse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReverseJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JobReport {
    pub segments: usize,
    pub duration_secs: f64,
}

/// Result of one job. Errors are flattened to text so outcomes can cross
/// thread boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutcome {
    pub job: ReverseJob,
    pub result: Result<JobReport, String>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Configuration for a batch run.
pub struct BatchConfig {
    /// Called with `(finished, total)` after every job. Returning `false`
    /// cancels the jobs that have not started yet.
    pub on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    pub cancelled: Arc<AtomicBool>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Runs many independent reverse jobs.
///
/// One failing job never aborts the others. Outcomes come back in job order.
pub trait BatchExecutor: Send {
    fn execute(
        &self,
        use_case: Arc<ReverseAudioUseCase>,
        jobs: Vec<ReverseJob>,
        config: BatchConfig,
    ) -> Vec<JobOutcome>;
}
