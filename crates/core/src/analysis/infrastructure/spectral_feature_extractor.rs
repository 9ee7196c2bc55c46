use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::analysis::domain::feature_extractor::{
    FeatureExtractionError, FeatureExtractor, FrameConfig,
};
use crate::analysis::domain::feature_vector::FeatureVector;
use crate::shared::constants::{CHROMA_BINS, MEL_BANDS, MFCC_COEFFICIENTS};

/// FFT-based extractor for energy, amplitude spectrum, MFCC and chroma.
///
/// Window, FFT plan and filter banks depend only on the frame config, so
/// they are built once and reused while the config stays the same.
pub struct SpectralFeatureExtractor {
    plan: Mutex<Option<Arc<SpectralPlan>>>,
}

struct SpectralPlan {
    config: FrameConfig,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    mel_bank: Vec<Vec<f64>>,
    /// Pitch class of every spectrum bin; `None` for the DC bin.
    pitch_classes: Vec<Option<usize>>,
}

impl SpectralPlan {
    fn new(config: FrameConfig) -> Self {
        let n = config.buffer_size;
        let mut planner = FftPlanner::new();
        let bins = n / 2;
        Self {
            config,
            fft: planner.plan_fft_forward(n),
            window: hann_window(n),
            mel_bank: mel_filter_bank(MEL_BANDS, n, config.sample_rate),
            pitch_classes: (0..bins)
                .map(|k| pitch_class(bin_frequency(k, n, config.sample_rate)))
                .collect(),
        }
    }
}

impl SpectralFeatureExtractor {
    pub fn new() -> Self {
        Self {
            plan: Mutex::new(None),
        }
    }

    fn plan_for(&self, config: &FrameConfig) -> Arc<SpectralPlan> {
        let mut cached = self.plan.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(plan) = cached.as_ref().filter(|p| p.config == *config) {
            return Arc::clone(plan);
        }
        let plan = Arc::new(SpectralPlan::new(*config));
        *cached = Some(Arc::clone(&plan));
        plan
    }
}

impl Default for SpectralFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for SpectralFeatureExtractor {
    fn extract(
        &self,
        frame: &[f32],
        config: &FrameConfig,
    ) -> Result<FeatureVector, FeatureExtractionError> {
        if config.sample_rate == 0 {
            return Err(FeatureExtractionError::InvalidSampleRate);
        }
        if config.buffer_size < 2 {
            return Err(FeatureExtractionError::BufferTooSmall(config.buffer_size));
        }
        if frame.len() != config.buffer_size {
            return Err(FeatureExtractionError::FrameLengthMismatch {
                expected: config.buffer_size,
                actual: frame.len(),
            });
        }
        if let Some(offset) = frame.iter().position(|s| !s.is_finite()) {
            return Err(FeatureExtractionError::NonFiniteSample(offset));
        }

        let plan = self.plan_for(config);
        let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();

        let mut buffer: Vec<Complex<f64>> = frame
            .iter()
            .zip(&plan.window)
            .map(|(&s, &w)| Complex::new(s as f64 * w, 0.0))
            .collect();
        plan.fft.process(&mut buffer);

        let amplitude_spectrum: Vec<f64> = buffer[..config.buffer_size / 2]
            .iter()
            .map(|c| c.norm())
            .collect();
        let power: Vec<f64> = amplitude_spectrum.iter().map(|a| a * a).collect();

        Ok(FeatureVector {
            energy,
            mfcc: mfcc(&power, &plan.mel_bank),
            chroma: chroma(&power, &plan.pitch_classes),
            amplitude_spectrum,
        })
    }
}

/// Symmetric Hann window.
fn hann_window(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

fn bin_frequency(bin: usize, n_fft: usize, sample_rate: u32) -> f64 {
    bin as f64 * sample_rate as f64 / n_fft as f64
}

fn hz_to_mel(freq: f64) -> f64 {
    2595.0 * (1.0 + freq / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular filters spaced evenly on the mel scale from 0 Hz to Nyquist,
/// laid over the `n_fft / 2` spectrum bins.
fn mel_filter_bank(bands: usize, n_fft: usize, sample_rate: u32) -> Vec<Vec<f64>> {
    let bins = n_fft / 2;
    let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
    let edges: Vec<f64> = (0..bands + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (bands + 1) as f64))
        .collect();

    (0..bands)
        .map(|band| {
            let (lower, center, upper) = (edges[band], edges[band + 1], edges[band + 2]);
            (0..bins)
                .map(|k| {
                    let freq = bin_frequency(k, n_fft, sample_rate);
                    if freq >= lower && freq <= center && center > lower {
                        (freq - lower) / (center - lower)
                    } else if freq > center && freq <= upper && upper > center {
                        (upper - freq) / (upper - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// DCT-II of the log mel energies, first `MFCC_COEFFICIENTS` terms.
fn mfcc(power: &[f64], mel_bank: &[Vec<f64>]) -> Vec<f64> {
    let log_mel: Vec<f64> = mel_bank
        .iter()
        .map(|filter| {
            let band: f64 = filter.iter().zip(power).map(|(w, p)| w * p).sum();
            band.ln_1p()
        })
        .collect();
    let m = log_mel.len() as f64;
    (0..MFCC_COEFFICIENTS)
        .map(|k| {
            log_mel
                .iter()
                .enumerate()
                .map(|(n, v)| v * (PI * k as f64 * (n as f64 + 0.5) / m).cos())
                .sum::<f64>()
        })
        .collect()
}

/// Pitch class (C = 0) of a frequency, or `None` for 0 Hz.
fn pitch_class(freq: f64) -> Option<usize> {
    if freq <= 0.0 {
        return None;
    }
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    Some((midi.round() as i64).rem_euclid(CHROMA_BINS as i64) as usize)
}

/// Power per pitch class, scaled so the strongest class is 1.
fn chroma(power: &[f64], pitch_classes: &[Option<usize>]) -> Vec<f64> {
    let mut classes = vec![0.0; CHROMA_BINS];
    for (p, class) in power.iter().zip(pitch_classes) {
        if let Some(class) = class {
            classes[*class] += p;
        }
    }
    let max = classes.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        classes.iter_mut().for_each(|c| *c /= max);
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const CONFIG: FrameConfig = FrameConfig {
        sample_rate: 44100,
        buffer_size: 512,
    };

    fn sine(freq: f64, amplitude: f64, len: usize, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()) as f32)
            .collect()
    }

    #[test]
    fn test_shapes_match_configuration() {
        let fv = SpectralFeatureExtractor::new()
            .extract(&sine(440.0, 0.5, 512, 44100), &CONFIG)
            .unwrap();
        assert_eq!(fv.amplitude_spectrum.len(), 256);
        assert_eq!(fv.mfcc.len(), MFCC_COEFFICIENTS);
        assert_eq!(fv.chroma.len(), CHROMA_BINS);
    }

    #[test]
    fn test_energy_is_sum_of_squares() {
        let frame = vec![0.5f32; 512];
        let fv = SpectralFeatureExtractor::new().extract(&frame, &CONFIG).unwrap();
        assert_relative_eq!(fv.energy, 128.0, epsilon = 1e-9);
    }

    #[test]
    fn test_silence_has_zero_features() {
        let fv = SpectralFeatureExtractor::new()
            .extract(&[0.0; 512], &CONFIG)
            .unwrap();
        assert_eq!(fv.energy, 0.0);
        assert!(fv.chroma.iter().all(|&c| c == 0.0));
        assert!(fv.mfcc.iter().all(|&c| c == 0.0));
        assert!(fv.amplitude_spectrum.iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_a440_peaks_in_pitch_class_a() {
        let fv = SpectralFeatureExtractor::new()
            .extract(&sine(440.0, 0.8, 512, 44100), &CONFIG)
            .unwrap();
        assert_relative_eq!(fv.chroma[9], 1.0);
        assert!(fv.chroma.iter().all(|&c| (0.0..=1.0).contains(&c)));

        let peak_bin = fv
            .amplitude_spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 5);
    }

    #[test]
    fn test_louder_frame_has_larger_first_mfcc() {
        let extractor = SpectralFeatureExtractor::new();
        let quiet = extractor.extract(&sine(1000.0, 0.05, 512, 44100), &CONFIG).unwrap();
        let loud = extractor.extract(&sine(1000.0, 0.9, 512, 44100), &CONFIG).unwrap();
        assert!(loud.mfcc[0] > quiet.mfcc[0]);
        assert!(loud.mfcc.iter().all(|c| c.is_finite()));
    }

    #[rstest]
    #[case::short_frame(vec![0.0; 100], CONFIG, FeatureExtractionError::FrameLengthMismatch { expected: 512, actual: 100 })]
    #[case::tiny_buffer(vec![0.0; 1], FrameConfig { sample_rate: 44100, buffer_size: 1 }, FeatureExtractionError::BufferTooSmall(1))]
    #[case::zero_rate(vec![0.0; 512], FrameConfig { sample_rate: 0, buffer_size: 512 }, FeatureExtractionError::InvalidSampleRate)]
    fn test_rejects_bad_input(
        #[case] frame: Vec<f32>,
        #[case] config: FrameConfig,
        #[case] expected: FeatureExtractionError,
    ) {
        assert_eq!(
            SpectralFeatureExtractor::new().extract(&frame, &config),
            Err(expected)
        );
    }

    #[test]
    fn test_rejects_nan_sample() {
        let mut frame = vec![0.0f32; 512];
        frame[17] = f32::NAN;
        assert_eq!(
            SpectralFeatureExtractor::new().extract(&frame, &CONFIG),
            Err(FeatureExtractionError::NonFiniteSample(17))
        );
    }

    #[test]
    fn test_plan_is_rebuilt_for_new_config() {
        let extractor = SpectralFeatureExtractor::new();
        let small = FrameConfig {
            sample_rate: 16000,
            buffer_size: 256,
        };
        assert_eq!(
            extractor.extract(&[0.1; 512], &CONFIG).unwrap().amplitude_spectrum.len(),
            256
        );
        assert_eq!(
            extractor.extract(&[0.1; 256], &small).unwrap().amplitude_spectrum.len(),
            128
        );
    }

    #[rstest]
    #[case::a4(440.0, 9)]
    #[case::c4(261.63, 0)]
    #[case::e5(659.25, 4)]
    fn test_pitch_class(#[case] freq: f64, #[case] expected: usize) {
        assert_eq!(pitch_class(freq), Some(expected));
    }

    #[test]
    fn test_mel_bank_rows_are_triangles_within_unit_range() {
        let bank = mel_filter_bank(MEL_BANDS, 512, 44100);
        assert_eq!(bank.len(), MEL_BANDS);
        for row in &bank {
            assert_eq!(row.len(), 256);
            assert!(row.iter().all(|&w| (0.0..=1.0).contains(&w)));
        }
    }
}
