/// Features computed for one analysis frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    /// Sum of squared samples. Never negative.
    pub energy: f64,
    pub mfcc: Vec<f64>,
    /// One value per pitch class, C first.
    pub chroma: Vec<f64>,
    pub amplitude_spectrum: Vec<f64>,
}

impl FeatureVector {
    /// The amplitude spectrum cut to its first `bins` values, each divided
    /// by `scale` and capped at 1.
    pub fn display_spectrum(&self, bins: usize, scale: f64) -> Vec<f64> {
        self.amplitude_spectrum
            .iter()
            .take(bins)
            .map(|&v| (v / scale).clamp(0.0, 1.0))
            .collect()
    }
}
