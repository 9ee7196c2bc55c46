/// Block length for RMS speech marking.
pub const VAD_FRAME_SIZE: usize = 1024;

/// Block RMS above this marks the block as speech. Assumes input in [-1.0, 1.0].
pub const VAD_RMS_THRESHOLD: f32 = 0.02;

/// Speech runs shorter than this are treated as clicks/noise.
pub const MIN_SPEECH_SECS: f64 = 0.25;

/// Speech runs separated by less than this are joined.
pub const MERGE_GAP_SECS: f64 = 0.2;

/// Longest stretch reversed as a single unit.
pub const MAX_CHUNK_SECS: f64 = 2.0;

/// Analysis frame length for spectral features.
pub const ANALYSIS_BUFFER_SIZE: usize = 512;

/// Stride between analysis frames.
pub const ANALYSIS_HOP_SIZE: usize = 256;

/// Number of amplitude-spectrum bins kept per spectrogram row.
pub const SPECTROGRAM_BINS: usize = 128;

/// Divisor that maps raw amplitudes into the [0, 1] display range.
pub const SPECTROGRAM_SCALE: f64 = 10.0;

pub const MFCC_COEFFICIENTS: usize = 13;
pub const MEL_BANDS: usize = 26;
pub const CHROMA_BINS: usize = 12;

/// Number of chroma entries reported as the formant summary.
pub const FORMANT_SUMMARY_LEN: usize = 5;

pub const DEFAULT_ENERGY_THRESHOLD: f64 = 0.1;
pub const DEFAULT_FORMANT_SHIFT_THRESHOLD: f64 = 0.1;

/// Detected frames closer than this many frame durations are merged.
pub const MERGE_GAP_FRAMES: f64 = 2.0;

pub const DEFAULT_MARKER_COLOR: &str = "#ff6384";

/// Search radius (seconds) for nearest-marker lookup.
pub const MARKER_SEARCH_RADIUS: f64 = 2.0;

/// Extensions handed to the WAV codec directly; everything else is transcoded first.
pub const WAV_EXTENSIONS: &[&str] = &["wav", "wave"];

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];
