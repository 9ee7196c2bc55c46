use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Observer for use-case runs: stage timings, frame progress, counts.
///
/// Use cases report through this instead of printing so the CLI, tests and
/// batch workers can each decide what to do with the events.
pub trait PipelineLogger: Send {
    /// Frame progress inside the current stage.
    fn progress(&mut self, done: usize, total: usize);

    /// Wall time spent in a named stage.
    fn stage(&mut self, name: &str, elapsed: Duration);

    /// A named count produced by the run (segments, frames, snippets).
    fn count(&mut self, name: &str, value: usize);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run report. Default: no-op.
    fn summary(&self) {}
}

/// Run `work`, reporting its wall time as stage `name`.
pub fn timed<T>(logger: &mut dyn PipelineLogger, name: &str, work: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let result = work();
    logger.stage(name, started.elapsed());
    result
}

/// Discards every event.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _done: usize, _total: usize) {}
    fn stage(&mut self, _name: &str, _elapsed: Duration) {}
    fn count(&mut self, _name: &str, _value: usize) {}
    fn info(&mut self, _message: &str) {}
}

/// Forwards events to the `log` facade and keeps totals for a summary.
///
/// Progress is logged each time it crosses another `step_percent` boundary.
pub struct StdoutPipelineLogger {
    step_percent: usize,
    last_step: Option<usize>,
    stages: BTreeMap<String, StageTotal>,
    counts: BTreeMap<String, usize>,
    started: Instant,
}

#[derive(Default, Clone, Copy)]
struct StageTotal {
    runs: usize,
    elapsed: Duration,
}

impl StdoutPipelineLogger {
    pub fn new(step_percent: usize) -> Self {
        Self {
            step_percent: step_percent.clamp(1, 100),
            last_step: None,
            stages: BTreeMap::new(),
            counts: BTreeMap::new(),
            started: Instant::now(),
        }
    }

    pub fn stage_total(&self, name: &str) -> Option<Duration> {
        self.stages.get(name).map(|s| s.elapsed)
    }

    pub fn count_for(&self, name: &str) -> Option<usize> {
        self.counts.get(name).copied()
    }

    /// Formatted report, or `None` when nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.counts.is_empty() {
            return None;
        }
        let wall = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!("Run summary ({:.2}s):", wall / 1000.0)];

        for (name, total) in &self.stages {
            let ms = total.elapsed.as_secs_f64() * 1000.0;
            let share = if wall > 0.0 { ms / wall * 100.0 } else { 0.0 };
            let runs = if total.runs > 1 {
                format!(" x{}", total.runs)
            } else {
                String::new()
            };
            lines.push(format!("  {name:10}: {ms:8.1}ms ({share:4.1}%){runs}"));
        }
        for (name, value) in &self.counts {
            lines.push(format!("  {name}: {value}"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        let step = done * 100 / total / self.step_percent;
        if self.last_step != Some(step) {
            self.last_step = Some(step);
            log::info!("Analyzing: {done}/{total} frames ({}%)", done * 100 / total);
        }
        if done >= total {
            self.last_step = None;
        }
    }

    fn stage(&mut self, name: &str, elapsed: Duration) {
        let total = self.stages.entry(name.to_string()).or_default();
        total.runs += 1;
        total.elapsed += elapsed;
        log::debug!("{name} took {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    }

    fn count(&mut self, name: &str, value: usize) {
        *self.counts.entry(name.to_string()).or_default() += value;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
