mod settings;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, ValueEnum};

use backmask_core::analysis::domain::analysis_record::{AnalysisId, MarkerId, MarkerUpdate};
use backmask_core::analysis::domain::frame_analyzer::FrameAnalyzer;
use backmask_core::analysis::domain::segment_detector::DetectionThresholds;
use backmask_core::analysis::infrastructure::json_analysis_store::JsonAnalysisStore;
use backmask_core::analysis::infrastructure::spectral_feature_extractor::SpectralFeatureExtractor;
use backmask_core::audio::domain::transcoder::{ExtractOptions, Transcoder};
use backmask_core::audio::infrastructure::ffmpeg_cli_transcoder::FfmpegCliTranscoder;
use backmask_core::audio::infrastructure::wav_codec::WavCodec;
use backmask_core::pipeline::analyze_audio_use_case::AnalyzeAudioUseCase;
use backmask_core::pipeline::batch_executor::{BatchConfig, BatchExecutor, ReverseJob};
use backmask_core::pipeline::infrastructure::threaded_batch_executor::ThreadedBatchExecutor;
use backmask_core::pipeline::output_layout::OutputLayout;
use backmask_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use backmask_core::pipeline::record_edit_use_case::RecordEditUseCase;
use backmask_core::pipeline::redetect_segments_use_case::RedetectSegmentsUseCase;
use backmask_core::pipeline::reverse_audio_use_case::ReverseAudioUseCase;
use backmask_core::pipeline::reversed_outputs_use_case::ReversedOutputsUseCase;
use backmask_core::pipeline::snippet_use_case::{SnippetRequest, SnippetUseCase};
use backmask_core::shared::constants::{VIDEO_EXTENSIONS, WAV_EXTENSIONS};
use backmask_core::speech::domain::speech_segmenter::SpeechSegmenter;

use settings::{ModeSetting, Settings};

/// Segment-aware audio reversal and reversed-speech analysis.
#[derive(Parser)]
#[command(name = "backmask", version)]
struct Cli {
    /// Root directory for uploads, reversed audio, analyses and snippets.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reverse audio or video files, globally or per speech region.
    Reverse {
        /// Input audio or video files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file for a single input, or output directory for several.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        mode: Option<ModeSetting>,

        /// Worker threads when reversing several files.
        #[arg(long)]
        workers: Option<usize>,

        /// RMS level above which a block counts as speech.
        #[arg(long)]
        rms_threshold: Option<f32>,

        /// Longest speech region reversed as one piece, in seconds.
        #[arg(long)]
        max_chunk: Option<f64>,
    },

    /// Reverse a file end to end and store its frame features as a new analysis.
    Analyze {
        input: PathBuf,

        /// Detect segments right away with the configured thresholds.
        #[arg(long)]
        detect: bool,

        #[arg(long)]
        energy: Option<f64>,

        #[arg(long)]
        formant_shift: Option<f64>,
    },

    /// Re-detect segments of a stored analysis with new thresholds.
    Redetect {
        id: AnalysisId,

        /// Normalized energy threshold (0.0-1.0).
        #[arg(long)]
        energy: Option<f64>,

        /// Normalized formant shift threshold (0.0-1.0).
        #[arg(long)]
        formant_shift: Option<f64>,
    },

    /// Attach a note to a detected segment or a snippet.
    Annotate {
        id: AnalysisId,
        #[arg(value_enum)]
        target: AnnotateTarget,
        index: usize,
        text: String,
    },

    /// Cut a reversed/forward snippet pair out of an analysis.
    Snippet {
        id: AnalysisId,
        /// Start time in seconds.
        start: f64,
        /// End time in seconds.
        end: f64,
        /// Playback speed stored with the snippet.
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        annotation: Option<String>,
    },

    /// List snippets of every analysis.
    Snippets,

    /// Delete a snippet and its files.
    DeleteSnippet { id: AnalysisId, file: String },

    /// List reversed audio files and the analyses they belong to.
    Outputs,

    /// Delete an analysis with its reversed audio and snippets, or a
    /// standalone reversed file by name.
    DeleteOutput {
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<AnalysisId>,

        /// File name inside the reversed directory.
        #[arg(long)]
        file: Option<String>,
    },

    /// Manage timeline markers.
    Marker {
        #[command(subcommand)]
        action: MarkerCommand,
    },

    /// Show the stored defaults.
    Settings {
        /// Overwrite the stored defaults with the built-in ones.
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AnnotateTarget {
    Segment,
    Snippet,
}

#[derive(Subcommand)]
enum MarkerCommand {
    Add {
        id: AnalysisId,
        timestamp: f64,
        label: String,
        /// CSS color, e.g. "#00ff00".
        #[arg(long)]
        color: Option<String>,
    },
    Update {
        id: AnalysisId,
        marker: MarkerId,
        #[arg(long)]
        timestamp: Option<f64>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    Remove {
        id: AnalysisId,
        marker: MarkerId,
    },
    List {
        id: AnalysisId,
    },
    /// Show the marker closest to a timestamp.
    Nearest {
        id: AnalysisId,
        timestamp: f64,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load();
    let layout = OutputLayout::new(
        cli.output_dir
            .clone()
            .unwrap_or_else(|| settings.resolved_output_dir()),
    );
    layout.ensure_dirs()?;

    match cli.command {
        Command::Reverse {
            inputs,
            output,
            mode,
            workers,
            rms_threshold,
            max_chunk,
        } => {
            let mut segmenter = settings.segmenter.clone();
            if let Some(threshold) = rms_threshold {
                segmenter = segmenter.with_rms_threshold(threshold);
            }
            if let Some(secs) = max_chunk {
                segmenter = segmenter.with_max_chunk_duration_secs(secs);
            }
            let use_case = ReverseAudioUseCase::new(
                Box::new(WavCodec::new()),
                SpeechSegmenter::new(segmenter),
                mode.unwrap_or(settings.mode).into(),
            );
            let workers = workers.or(settings.workers);
            run_reverse(&inputs, output.as_deref(), use_case, workers, &layout)
        }
        Command::Analyze {
            input,
            detect,
            energy,
            formant_shift,
        } => {
            let thresholds = thresholds(&settings, energy, formant_shift)?;
            run_analyze(&input, detect.then_some(thresholds), &settings, &layout)
        }
        Command::Redetect {
            id,
            energy,
            formant_shift,
        } => {
            let thresholds = thresholds(&settings, energy, formant_shift)?;
            let mut logger = StdoutPipelineLogger::default();
            let segments =
                RedetectSegmentsUseCase::new(store(&layout)).run(id, &thresholds, &mut logger)?;
            for (i, s) in segments.iter().enumerate() {
                println!("{i}\t{:.3}\t{:.3}", s.start, s.end);
            }
            Ok(())
        }
        Command::Annotate {
            id,
            target,
            index,
            text,
        } => {
            let use_case = RecordEditUseCase::new(store(&layout));
            match target {
                AnnotateTarget::Segment => use_case.annotate_segment(id, index, &text)?,
                AnnotateTarget::Snippet => use_case.annotate_snippet(id, index, &text)?,
            }
            Ok(())
        }
        Command::Snippet {
            id,
            start,
            end,
            speed,
            annotation,
        } => {
            let request = SnippetRequest {
                start,
                end,
                playback_speed: speed,
                annotation,
            };
            let mut logger = StdoutPipelineLogger::default();
            let snippet = snippet_use_case(&layout).extract(id, &request, &mut logger)?;
            println!("{}\t{}", snippet.file, snippet.forward_file);
            Ok(())
        }
        Command::Snippets => {
            for listed in snippet_use_case(&layout).list()? {
                let s = &listed.snippet;
                println!(
                    "{}\t{}\t{:.3}-{:.3}\t{}x\t{}",
                    listed.analysis_id, s.file, s.start, s.end, s.playback_speed, s.annotation
                );
            }
            Ok(())
        }
        Command::DeleteSnippet { id, file } => {
            let removed = snippet_use_case(&layout).delete(id, &file)?;
            log::info!("Deleted {} and {}", removed.file, removed.forward_file);
            Ok(())
        }
        Command::Outputs => {
            let use_case = ReversedOutputsUseCase::new(store(&layout), layout.clone());
            for output in use_case.list()? {
                let owner = output
                    .analysis_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string());
                println!("{owner}\t{}", output.file);
            }
            Ok(())
        }
        Command::DeleteOutput { id, file } => {
            let use_case = ReversedOutputsUseCase::new(store(&layout), layout.clone());
            let removed = match (id, file) {
                (Some(id), _) => use_case.delete(id)?,
                (None, Some(file)) => use_case.delete_file(&file)?,
                (None, None) => return Err("Give an analysis id or --file".into()),
            };
            for path in removed {
                log::info!("Deleted {}", path.display());
            }
            Ok(())
        }
        Command::Marker { action } => run_marker(action, &layout),
        Command::Settings { reset } => {
            let shown = if reset {
                let defaults = Settings::default();
                let path = defaults.save()?;
                log::info!("Reset settings at {}", path.display());
                defaults
            } else {
                settings
            };
            if let Some(path) = Settings::config_path() {
                println!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}

/// A reverse job plus the video to mux its output into, if any.
struct PreparedJob {
    job: ReverseJob,
    mux: Option<(PathBuf, PathBuf)>,
}

fn run_reverse(
    inputs: &[PathBuf],
    output: Option<&Path>,
    use_case: ReverseAudioUseCase,
    workers: Option<usize>,
    layout: &OutputLayout,
) -> Result<(), Box<dyn std::error::Error>> {
    for input in inputs {
        validate_input(input)?;
    }
    let transcoder = FfmpegCliTranscoder::new();
    let scratch = tempfile::tempdir()?;

    let mut prepared = Vec::with_capacity(inputs.len());
    let targets = output_paths(inputs, output, layout);
    for (i, (input, target)) in inputs.iter().zip(targets).enumerate() {
        prepared.push(prepare_job(i, input, target, &transcoder, scratch.path())?);
    }

    let mut failed = 0;
    if let [single] = prepared.as_slice() {
        let mut logger = StdoutPipelineLogger::default();
        use_case.run(&single.job.input, &single.job.output, &mut logger)?;
        logger.summary();
    } else {
        let executor =
            workers.map_or_else(ThreadedBatchExecutor::default, ThreadedBatchExecutor::new);
        let config = BatchConfig {
            on_progress: Some(Box::new(|done, total| {
                eprint!("\rReversed {done}/{total} files");
                true
            })),
            ..Default::default()
        };
        let jobs = prepared.iter().map(|p| p.job.clone()).collect();
        let outcomes = executor.execute(Arc::new(use_case), jobs, config);
        eprintln!();

        for (outcome, job) in outcomes.iter().zip(prepared.iter_mut()) {
            if !outcome.is_ok() {
                failed += 1;
                job.mux = None;
            }
        }
    }

    for PreparedJob { mux, job } in &prepared {
        if let Some((video, target)) = mux {
            transcoder.replace_audio(video, &job.output, target)?;
            log::info!("Output written to {}", target.display());
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} files failed", prepared.len()).into());
    }
    Ok(())
}

/// WAV inputs are reversed as they are; anything else is first converted
/// to WAV in `scratch`. Video output is muxed back after reversal.
fn prepare_job(
    index: usize,
    input: &Path,
    target: PathBuf,
    transcoder: &dyn Transcoder,
    scratch: &Path,
) -> Result<PreparedJob, Box<dyn std::error::Error>> {
    if has_extension(input, WAV_EXTENSIONS) {
        return Ok(PreparedJob {
            job: ReverseJob {
                input: input.to_path_buf(),
                output: target,
            },
            mux: None,
        });
    }

    let extracted = scratch.join(format!("{index}_source.wav"));
    transcoder.extract_audio(input, &extracted, &ExtractOptions::default())?;
    if has_extension(input, VIDEO_EXTENSIONS) {
        Ok(PreparedJob {
            job: ReverseJob {
                input: extracted,
                output: scratch.join(format!("{index}_reversed.wav")),
            },
            mux: Some((input.to_path_buf(), target)),
        })
    } else {
        Ok(PreparedJob {
            job: ReverseJob {
                input: extracted,
                output: target,
            },
            mux: None,
        })
    }
}

fn output_path(
    input: &Path,
    output: Option<&Path>,
    batch: bool,
    layout: &OutputLayout,
) -> PathBuf {
    if let (Some(path), false) = (output, batch) {
        return path.to_path_buf();
    }
    let dir = output.map_or_else(|| layout.reversed_dir(), Path::to_path_buf);
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let extension = if has_extension(input, VIDEO_EXTENSIONS) {
        input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mp4".to_string())
    } else {
        "wav".to_string()
    };
    dir.join(format!("reversed_{stem}.{extension}"))
}

/// One output path per input. Batch inputs that would land on the same
/// name get `_2`, `_3`, ... appended in input order.
fn output_paths(
    inputs: &[PathBuf],
    output: Option<&Path>,
    layout: &OutputLayout,
) -> Vec<PathBuf> {
    let batch = inputs.len() > 1;
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let base = output_path(input, output, batch, layout);
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = numbered(&base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    path.with_file_name(name)
}

fn run_analyze(
    input: &Path,
    detect: Option<DetectionThresholds>,
    settings: &Settings,
    layout: &OutputLayout,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_input(input)?;
    let upload = import_upload(input, layout, &FfmpegCliTranscoder::new())?;

    let analyzer = FrameAnalyzer::new(
        Box::new(SpectralFeatureExtractor::new()),
        settings.analysis.clone(),
    );
    let use_case = AnalyzeAudioUseCase::new(
        Box::new(WavCodec::new()),
        analyzer,
        store(layout),
        layout.clone(),
    );

    let mut logger = StdoutPipelineLogger::default();
    let outcome = use_case.run(&upload, &mut logger)?;
    if let Some(thresholds) = detect {
        RedetectSegmentsUseCase::new(store(layout)).run(outcome.id, &thresholds, &mut logger)?;
    }
    logger.summary();
    println!("{}", outcome.id);
    Ok(())
}

/// Copy or convert an input into the uploads directory as WAV.
fn import_upload(
    input: &Path,
    layout: &OutputLayout,
    transcoder: &dyn Transcoder,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let upload = layout.uploads_dir().join(format!("{stem}_{stamp}.wav"));

    if has_extension(input, WAV_EXTENSIONS) {
        fs::copy(input, &upload)?;
    } else {
        transcoder.extract_audio(input, &upload, &ExtractOptions::default())?;
    }
    log::debug!("Stored upload at {}", upload.display());
    Ok(upload)
}

fn run_marker(
    action: MarkerCommand,
    layout: &OutputLayout,
) -> Result<(), Box<dyn std::error::Error>> {
    let use_case = RecordEditUseCase::new(store(layout));
    match action {
        MarkerCommand::Add {
            id,
            timestamp,
            label,
            color,
        } => {
            let marker = use_case.add_marker(id, timestamp, &label, color.as_deref())?;
            println!("{}", marker.id);
        }
        MarkerCommand::Update {
            id,
            marker,
            timestamp,
            label,
            color,
        } => {
            let update = MarkerUpdate {
                timestamp,
                label,
                color,
            };
            use_case.update_marker(id, marker, update)?;
        }
        MarkerCommand::Remove { id, marker } => {
            use_case.remove_marker(id, marker)?;
        }
        MarkerCommand::List { id } => {
            for m in use_case.markers(id)? {
                println!("{}\t{:.3}\t{}\t{}", m.id, m.timestamp, m.color, m.label);
            }
        }
        MarkerCommand::Nearest { id, timestamp } => match use_case.nearest_marker(id, timestamp)? {
            Some(m) => println!("{}\t{:.3}\t{}\t{}", m.id, m.timestamp, m.color, m.label),
            None => log::info!("No marker near {timestamp:.3}s"),
        },
    }
    Ok(())
}

fn thresholds(
    settings: &Settings,
    energy: Option<f64>,
    formant_shift: Option<f64>,
) -> Result<DetectionThresholds, Box<dyn std::error::Error>> {
    let mut thresholds = settings.thresholds;
    if let Some(value) = energy {
        thresholds = thresholds.with_energy(value);
    }
    if let Some(value) = formant_shift {
        thresholds = thresholds.with_formant_shift(value);
    }
    for (name, value) in [
        ("Energy", thresholds.energy),
        ("Formant shift", thresholds.formant_shift),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(
                format!("{name} threshold must be between 0.0 and 1.0, got {value}").into(),
            );
        }
    }
    Ok(thresholds)
}

fn validate_input(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !input.is_file() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    Ok(())
}

fn store(layout: &OutputLayout) -> Box<JsonAnalysisStore> {
    Box::new(JsonAnalysisStore::new(layout.reversed_dir()))
}

fn snippet_use_case(layout: &OutputLayout) -> SnippetUseCase {
    SnippetUseCase::new(Box::new(WavCodec::new()), store(layout), layout.clone())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
