use super::normalized_series::NormalizedSeries;

/// Per-frame feature series of one analysis pass, in frame order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureTrack {
    pub energies: Vec<f64>,
    pub mfcc: Vec<Vec<f64>>,
    pub chroma: Vec<Vec<f64>>,
    /// Display-scaled amplitude spectra.
    pub spectrogram: Vec<Vec<f64>>,
}

impl FeatureTrack {
    pub fn push_frame(
        &mut self,
        energy: f64,
        mfcc: Vec<f64>,
        chroma: Vec<f64>,
        spectrum: Vec<f64>,
    ) {
        self.energies.push(energy);
        self.mfcc.push(mfcc);
        self.chroma.push(chroma);
        self.spectrogram.push(spectrum);
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    /// `|chroma[i][0] - chroma[i-1][0]|` for every consecutive frame pair.
    ///
    /// One shorter than the track; empty for tracks of fewer than two frames.
    pub fn formant_shifts(&self) -> Vec<f64> {
        self.chroma
            .windows(2)
            .map(|pair| (first_class(&pair[1]) - first_class(&pair[0])).abs())
            .collect()
    }

    /// Leading `count` chroma values of the first frame.
    pub fn formant_summary(&self, count: usize) -> Vec<f64> {
        self.chroma
            .first()
            .map(|c| c.iter().take(count).copied().collect())
            .unwrap_or_default()
    }

    pub fn normalized_energies(&self) -> NormalizedSeries {
        NormalizedSeries::from_raw(&self.energies)
    }

    pub fn normalized_formant_shifts(&self) -> NormalizedSeries {
        NormalizedSeries::from_raw(&self.formant_shifts())
    }
}

fn first_class(chroma: &[f64]) -> f64 {
    chroma.first().copied().unwrap_or(0.0)
}
