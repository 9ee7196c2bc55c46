use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::DEFAULT_MARKER_COLOR;
use crate::shared::time_segment::TimeSegment;

use super::normalized_series::NormalizedSeries;

pub type AnalysisId = u64;
pub type MarkerId = u64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("{kind} index {index} out of range (have {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("no marker with id {0}")]
    MarkerNotFound(MarkerId),
    #[error("no snippet with file name {0}")]
    SnippetNotFound(String),
    #[error("timestamp must be a finite, non-negative number of seconds (got {0})")]
    InvalidTimestamp(f64),
}

/// Everything persisted about one analyzed upload.
///
/// Every field has a default so records written by older versions, which
/// lack e.g. `markers`, still load.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisRecord {
    pub mfcc: Vec<Vec<f64>>,
    pub formants: Vec<f64>,
    pub spectrogram: Vec<Vec<f64>>,
    pub detected_segments: Vec<TimeSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_energy_values: Option<NormalizedSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_formant_shifts: Option<NormalizedSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_audio_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reversed_audio_path: Option<PathBuf>,
    pub snippets: Vec<Snippet>,
    pub markers: Vec<Marker>,
}

/// A reversed fragment and the forward fragment over the same time range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub file: String,
    pub forward_file: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub annotation: String,
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f64,
}

fn default_playback_speed() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub timestamp: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_marker_color")]
    pub color: String,
}

fn default_marker_color() -> String {
    DEFAULT_MARKER_COLOR.to_string()
}

/// Fields to change on an existing marker. `None` leaves a field as is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarkerUpdate {
    pub timestamp: Option<f64>,
    pub label: Option<String>,
    pub color: Option<String>,
}

impl AnalysisRecord {
    pub fn annotate_segment(&mut self, index: usize, text: &str) -> Result<(), RecordError> {
        let len = self.detected_segments.len();
        let segment = self
            .detected_segments
            .get_mut(index)
            .ok_or(RecordError::IndexOutOfRange {
                kind: "segment",
                index,
                len,
            })?;
        segment.annotation = text.to_string();
        Ok(())
    }

    pub fn annotate_snippet(&mut self, index: usize, text: &str) -> Result<(), RecordError> {
        let len = self.snippets.len();
        let snippet = self
            .snippets
            .get_mut(index)
            .ok_or(RecordError::IndexOutOfRange {
                kind: "snippet",
                index,
                len,
            })?;
        snippet.annotation = text.to_string();
        Ok(())
    }

    pub fn add_snippet(&mut self, snippet: Snippet) {
        self.snippets.push(snippet);
    }

    /// Remove the snippet whose reversed fragment is `file`.
    pub fn remove_snippet(&mut self, file: &str) -> Result<Snippet, RecordError> {
        let index = self
            .snippets
            .iter()
            .position(|s| s.file == file)
            .ok_or_else(|| RecordError::SnippetNotFound(file.to_string()))?;
        Ok(self.snippets.remove(index))
    }

    pub fn add_marker(
        &mut self,
        timestamp: f64,
        label: &str,
        color: Option<&str>,
    ) -> Result<&Marker, RecordError> {
        check_timestamp(timestamp)?;
        let id = self.markers.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        self.markers.push(Marker {
            id,
            timestamp,
            label: label.to_string(),
            color: color.map_or_else(default_marker_color, str::to_string),
        });
        Ok(&self.markers[self.markers.len() - 1])
    }

    pub fn update_marker(
        &mut self,
        id: MarkerId,
        update: MarkerUpdate,
    ) -> Result<&Marker, RecordError> {
        if let Some(timestamp) = update.timestamp {
            check_timestamp(timestamp)?;
        }
        let marker = self
            .markers
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(RecordError::MarkerNotFound(id))?;
        if let Some(timestamp) = update.timestamp {
            marker.timestamp = timestamp;
        }
        if let Some(label) = update.label {
            marker.label = label;
        }
        if let Some(color) = update.color {
            marker.color = color;
        }
        Ok(marker)
    }

    pub fn remove_marker(&mut self, id: MarkerId) -> Result<Marker, RecordError> {
        let index = self
            .markers
            .iter()
            .position(|m| m.id == id)
            .ok_or(RecordError::MarkerNotFound(id))?;
        Ok(self.markers.remove(index))
    }

    pub fn sorted_markers(&self) -> Vec<&Marker> {
        let mut markers: Vec<&Marker> = self.markers.iter().collect();
        markers.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        markers
    }

    /// Closest marker strictly within `radius` seconds of `timestamp`.
    /// Ties go to the marker stored first.
    pub fn nearest_marker(&self, timestamp: f64, radius: f64) -> Option<&Marker> {
        let mut best: Option<(&Marker, f64)> = None;
        for marker in &self.markers {
            let distance = (marker.timestamp - timestamp).abs();
            let limit = best.map_or(radius, |(_, d)| d);
            if distance < limit {
                best = Some((marker, distance));
            }
        }
        best.map(|(marker, _)| marker)
    }
}

fn check_timestamp(timestamp: f64) -> Result<(), RecordError> {
    if !timestamp.is_finite() || timestamp < 0.0 {
        return Err(RecordError::InvalidTimestamp(timestamp));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn snippet(file: &str) -> Snippet {
        Snippet {
            file: file.to_string(),
            forward_file: format!("forward_{file}"),
            start: 1.0,
            end: 2.0,
            annotation: String::new(),
            playback_speed: 1.0,
        }
    }

    fn record_with_markers(timestamps: &[f64]) -> AnalysisRecord {
        let mut record = AnalysisRecord::default();
        for &t in timestamps {
            record.add_marker(t, "", None).unwrap();
        }
        record
    }

    #[test]
    fn test_annotate_segment() {
        let mut record = AnalysisRecord {
            detected_segments: vec![TimeSegment::new(0.0, 1.0), TimeSegment::new(2.0, 3.0)],
            ..Default::default()
        };
        record.annotate_segment(1, "backwards hello").unwrap();
        assert_eq!(record.detected_segments[1].annotation, "backwards hello");
        assert!(record.detected_segments[0].annotation.is_empty());
    }

    #[rstest]
    #[case::segment(true)]
    #[case::snippet(false)]
    fn test_annotate_out_of_range(#[case] segment: bool) {
        let mut record = AnalysisRecord::default();
        let result = if segment {
            record.annotate_segment(0, "x")
        } else {
            record.annotate_snippet(3, "x")
        };
        assert!(matches!(
            result,
            Err(RecordError::IndexOutOfRange { len: 0, .. })
        ));
    }

    #[test]
    fn test_remove_snippet_by_file() {
        let mut record = AnalysisRecord::default();
        record.add_snippet(snippet("a.wav"));
        record.add_snippet(snippet("b.wav"));
        let removed = record.remove_snippet("a.wav").unwrap();
        assert_eq!(removed.forward_file, "forward_a.wav");
        assert_eq!(record.snippets.len(), 1);
        assert_eq!(
            record.remove_snippet("a.wav"),
            Err(RecordError::SnippetNotFound("a.wav".to_string()))
        );
    }

    #[test]
    fn test_marker_ids_increase_from_max() {
        let mut record = record_with_markers(&[1.0, 2.0]);
        record.remove_marker(1).unwrap();
        let marker = record.add_marker(3.0, "third", Some("#00ff00")).unwrap();
        assert_eq!(marker.id, 3);
        assert_eq!(marker.color, "#00ff00");
        assert_eq!(record.markers[0].color, DEFAULT_MARKER_COLOR);
    }

    #[test]
    fn test_update_marker_changes_only_given_fields() {
        let mut record = record_with_markers(&[4.0]);
        let updated = record
            .update_marker(
                1,
                MarkerUpdate {
                    label: Some("chorus".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.label, "chorus");
        assert_eq!(updated.timestamp, 4.0);
        assert_eq!(
            record.update_marker(9, MarkerUpdate::default()).unwrap_err(),
            RecordError::MarkerNotFound(9)
        );
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let mut record = AnalysisRecord::default();
        assert!(matches!(
            record.add_marker(-1.0, "", None),
            Err(RecordError::InvalidTimestamp(_))
        ));
        assert!(record.markers.is_empty());
    }

    #[test]
    fn test_sorted_markers() {
        let record = record_with_markers(&[5.0, 1.0, 3.0]);
        let order: Vec<f64> = record.sorted_markers().iter().map(|m| m.timestamp).collect();
        assert_eq!(order, vec![1.0, 3.0, 5.0]);
    }

    #[rstest]
    #[case::closest(4.2, Some(4.0))]
    #[case::between_prefers_closer(6.9, Some(8.0))]
    #[case::exactly_at_radius(12.0, None)]
    #[case::far_away(100.0, None)]
    fn test_nearest_marker(#[case] at: f64, #[case] expected: Option<f64>) {
        let record = record_with_markers(&[4.0, 8.0, 10.0]);
        let found = record.nearest_marker(at, 2.0).map(|m| m.timestamp);
        assert_eq!(found, expected);
    }

    #[test]
    fn test_old_record_without_new_fields_loads() {
        let json = r#"{
            "mfcc": [[1.0, 2.0]],
            "formants": [0.1],
            "spectrogram": [],
            "detectedSegments": [{"start": 0.0, "end": 0.5}],
            "normalizedEnergyValues": [1.0, 0.5],
            "hopSize": 256,
            "sampleRate": 44100,
            "duration": 1.5,
            "snippets": [{"file": "s.wav", "forwardFile": "f.wav", "start": 0, "end": 1}]
        }"#;
        let record: AnalysisRecord = serde_json::from_str(json).unwrap();
        assert!(record.normalized_formant_shifts.is_none());
        assert!(record.markers.is_empty());
        assert_eq!(record.snippets[0].playback_speed, 1.0);
        assert_eq!(record.detected_segments[0].annotation, "");
    }

    #[test]
    fn test_serializes_camel_case_keys() {
        let record = AnalysisRecord {
            hop_size: Some(256),
            ..Default::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["hopSize"], 256);
        assert!(json.get("detectedSegments").is_some());
        assert!(json.get("normalizedFormantShifts").is_none());
    }
}
