// In-progress samples for one container over one interval.

use chrono::{DateTime, Utc};

use crate::models::RawSample;

#[derive(Debug, Clone)]
pub struct Window {
    pub container_id: String,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    samples: Vec<RawSample>,
}

impl Window {
    pub fn new(container_id: impl Into<String>, name: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            container_id: container_id.into(),
            name: name.into(),
            start,
            end: start,
            samples: Vec::new(),
        }
    }

    /// Appends a sample; samples for another container are refused.
    pub fn push(&mut self, sample: RawSample) -> bool {
        if sample.container_id != self.container_id {
            return false;
        }
        if sample.timestamp > self.end {
            self.end = sample.timestamp;
        }
        self.samples.push(sample);
        true
    }

    /// Marks the window closed at `end`.
    pub fn close(mut self, end: DateTime<Utc>) -> Self {
        self.end = end;
        self
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
