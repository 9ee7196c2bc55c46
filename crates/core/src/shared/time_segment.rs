use serde::{Deserialize, Serialize};

/// A time range in seconds with a free-form user annotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub annotation: String,
}

impl TimeSegment {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            annotation: String::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
