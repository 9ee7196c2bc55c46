use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::batch_executor::{
    BatchConfig, BatchExecutor, JobOutcome, JobReport, ReverseJob,
};
use crate::pipeline::pipeline_logger::NullPipelineLogger;
use crate::pipeline::reverse_audio_use_case::ReverseAudioUseCase;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Executes reverse jobs on a fixed pool of worker threads.
///
/// Layout: `feeder → [worker × N] → main [collect/progress]`
pub struct ThreadedBatchExecutor {
    workers: usize,
    channel_capacity: usize,
}

impl ThreadedBatchExecutor {
    /// `workers` is clamped to at least one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadedBatchExecutor {
    fn default() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }
}

impl BatchExecutor for ThreadedBatchExecutor {
    fn execute(
        &self,
        use_case: Arc<ReverseAudioUseCase>,
        jobs: Vec<ReverseJob>,
        config: BatchConfig,
    ) -> Vec<JobOutcome> {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }
        let worker_count = self.workers.min(total);
        log::info!("Reversing {total} files on {worker_count} workers");

        let (job_tx, job_rx) =
            crossbeam_channel::bounded::<(usize, ReverseJob)>(self.channel_capacity);
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<(usize, JobOutcome)>();

        let feeder = spawn_feeder(jobs.clone(), job_tx);
        let workers: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|_| {
                spawn_worker(
                    use_case.clone(),
                    job_rx.clone(),
                    outcome_tx.clone(),
                    config.cancelled.clone(),
                )
            })
            .collect();
        drop(job_rx);
        drop(outcome_tx);

        let mut slots: Vec<Option<JobOutcome>> = vec![None; total];
        let mut finished = 0;
        for (index, outcome) in outcome_rx {
            if let Err(e) = &outcome.result {
                log::warn!("{}: {e}", outcome.job.input.display());
            }
            slots[index] = Some(outcome);
            finished += 1;
            if let Some(ref callback) = config.on_progress {
                if !callback(finished, total) {
                    config.cancelled.store(true, Ordering::Relaxed);
                }
            }
        }

        if feeder.join().is_err() {
            log::error!("Feeder thread panicked");
        }
        for handle in workers {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }

        slots
            .into_iter()
            .zip(jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| JobOutcome {
                    job,
                    result: Err("Worker thread panicked".to_string()),
                })
            })
            .collect()
    }
}

fn spawn_feeder(jobs: Vec<ReverseJob>, job_tx: Sender<(usize, ReverseJob)>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for indexed in jobs.into_iter().enumerate() {
            if job_tx.send(indexed).is_err() {
                break;
            }
        }
    })
}

fn spawn_worker(
    use_case: Arc<ReverseAudioUseCase>,
    job_rx: Receiver<(usize, ReverseJob)>,
    outcome_tx: Sender<(usize, JobOutcome)>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for (index, job) in job_rx {
            let result = if cancelled.load(Ordering::Relaxed) {
                Err("Cancelled".to_string())
            } else {
                use_case
                    .run(&job.input, &job.output, &mut NullPipelineLogger)
                    .map(|outcome| JobReport {
                        segments: outcome.segments.len(),
                        duration_secs: outcome.signal.duration(),
                    })
                    .map_err(|e| e.to_string())
            };
            if outcome_tx.send((index, JobOutcome { job, result })).is_err() {
                break;
            }
        }
    })
}
