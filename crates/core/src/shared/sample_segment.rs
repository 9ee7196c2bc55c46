use thiserror::Error;

use super::time_segment::TimeSegment;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("invalid segment bounds: start {start} must be before end {end}")]
    InvalidBounds { start: usize, end: usize },
    #[error("segment [{start}, {end}) exceeds signal length {len}")]
    OutOfRange { start: usize, end: usize, len: usize },
}

/// Half-open range of sample indices `[start, end)` within one signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleSegment {
    start: usize,
    end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl SampleSegment {
    pub fn new(start: usize, end: usize) -> Result<Self, SegmentError> {
        if start >= end {
            return Err(SegmentError::InvalidBounds { start, end });
        }
        Ok(Self { start, end })
    }

    /// Like [`SampleSegment::new`], additionally checking `end <= len`.
    pub fn within(start: usize, end: usize, len: usize) -> Result<Self, SegmentError> {
        let segment = Self::new(start, end)?;
        segment.check_fits(len)?;
        Ok(segment)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn check_fits(&self, len: usize) -> Result<(), SegmentError> {
        if self.end > len {
            return Err(SegmentError::OutOfRange {
                start: self.start,
                end: self.end,
                len,
            });
        }
        Ok(())
    }

    pub fn to_time_segment(&self, sample_rate: u32) -> TimeSegment {
        let rate = sample_rate as f64;
        TimeSegment::new(self.start as f64 / rate, self.end as f64 / rate)
    }
}
