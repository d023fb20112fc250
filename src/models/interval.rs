use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A busy block on one person's calendar, normalized to UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    #[serde(default)]
    pub person_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(person_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            person_id: person_id.to_string(),
            start,
            end,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.person_id.trim().is_empty() {
            return Err(ValidationError::MissingPersonId);
        }
        if self.end <= self.start {
            return Err(ValidationError::EndNotAfterStart);
        }
        Ok(())
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    /// Hours of this interval that fall inside `[start, end)`.
    pub fn overlap_hours(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
        let from = self.start.max(start);
        let to = self.end.min(end);
        if to <= from {
            return 0.0;
        }
        (to - from).num_seconds() as f64 / 3600.0
    }

    pub fn hours(&self) -> f64 {
        self.overlap_hours(self.start, self.end)
    }
}

/// A person whose calendar the source could not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxFailure {
    pub person_id: String,
    pub message: String,
}

/// Result of one calendar fetch: readable busy time plus the people it is missing for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusySchedule {
    pub intervals: Vec<BusyInterval>,
    pub unavailable: Vec<MailboxFailure>,
}

impl BusySchedule {
    pub fn from_intervals(intervals: Vec<BusyInterval>) -> Self {
        Self {
            intervals,
            unavailable: Vec::new(),
        }
    }

    pub fn is_unavailable(&self, person_id: &str) -> bool {
        self.unavailable
            .iter()
            .any(|failure| failure.person_id == person_id)
    }

    pub fn extend(&mut self, other: BusySchedule) {
        self.intervals.extend(other.intervals);
        self.unavailable.extend(other.unavailable);
    }
}
