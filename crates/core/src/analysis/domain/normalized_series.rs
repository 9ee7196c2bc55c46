use serde::{Deserialize, Serialize};

/// Frame-indexed values scaled into `[0, 1]` by the series maximum.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedSeries(Vec<f64>);

impl NormalizedSeries {
    /// Divide every value by the maximum. A series whose maximum is zero (or
    /// that is empty) is divided by 1 instead, so the result is never NaN.
    pub fn from_raw(values: &[f64]) -> Self {
        let max = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f64, f64::max);
        let divisor = if max > 0.0 { max } else { 1.0 };
        Self(
            values
                .iter()
                .map(|&v| {
                    if v.is_finite() {
                        (v / divisor).clamp(0.0, 1.0)
                    } else {
                        0.0
                    }
                })
                .collect(),
        )
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_divides_by_maximum() {
        let series = NormalizedSeries::from_raw(&[1.0, 2.0, 4.0]);
        assert_relative_eq!(series.values()[0], 0.25);
        assert_relative_eq!(series.values()[1], 0.5);
        assert_relative_eq!(series.values()[2], 1.0);
    }

    #[rstest]
    #[case::all_zero(vec![0.0, 0.0, 0.0])]
    #[case::empty(vec![])]
    fn test_zero_maximum_yields_zeros(#[case] raw: Vec<f64>) {
        let series = NormalizedSeries::from_raw(&raw);
        assert_eq!(series.len(), raw.len());
        assert!(series.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_values_stay_in_unit_interval() {
        let raw = [0.3, 17.0, 0.0, 5.5, 1e-9, f64::NAN];
        let series = NormalizedSeries::from_raw(&raw);
        assert!(series
            .values()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let series = NormalizedSeries::from_raw(&[2.0, 1.0]);
        assert_eq!(serde_json::to_string(&series).unwrap(), "[1.0,0.5]");
    }
}
