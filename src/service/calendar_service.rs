use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clients::graph_client::GraphClient;
use crate::error::{ConfigError, UpstreamError};
use crate::models::interval::{BusyInterval, BusySchedule, MailboxFailure};

/// Busy time for a set of people. A failure for the whole source is an `Err`;
/// people the source cannot answer for come back in `BusySchedule::unavailable`.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn get_busy_intervals(
        &self,
        person_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError>;
}

pub struct GraphCalendarService {
    client: GraphClient,
}

impl GraphCalendarService {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CalendarSource for GraphCalendarService {
    async fn get_busy_intervals(
        &self,
        person_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError> {
        self.client.get_schedules(person_ids, start, end).await
    }
}

/// Serves a fixed set of intervals, for tests and offline demos.
pub struct FixtureCalendarSource {
    intervals: Vec<BusyInterval>,
    unavailable: Vec<MailboxFailure>,
}

impl FixtureCalendarSource {
    pub fn new(intervals: Vec<BusyInterval>) -> Self {
        Self {
            intervals,
            unavailable: Vec::new(),
        }
    }

    /// Marks `person_id` as a mailbox the calendar cannot read.
    pub fn with_unavailable(mut self, person_id: &str, message: &str) -> Self {
        self.unavailable.push(MailboxFailure {
            person_id: person_id.to_string(),
            message: message.to_string(),
        });
        self
    }

    /// Reads a JSON array of `{person_id, start, end}` objects.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let intervals: Vec<BusyInterval> =
            serde_json::from_str(&content).map_err(|e| ConfigError::Fixture(e.to_string()))?;
        Ok(Self::new(intervals))
    }
}

#[async_trait]
impl CalendarSource for FixtureCalendarSource {
    async fn get_busy_intervals(
        &self,
        person_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError> {
        let requested = |person: &str| {
            person_ids.is_empty() || person_ids.iter().any(|id| id == person)
        };
        Ok(BusySchedule {
            intervals: self
                .intervals
                .iter()
                .filter(|interval| interval.person_id.is_empty() || requested(&interval.person_id))
                .filter(|interval| interval.end <= interval.start || interval.overlaps(start, end))
                .cloned()
                .collect(),
            unavailable: self
                .unavailable
                .iter()
                .filter(|failure| requested(&failure.person_id))
                .cloned()
                .collect(),
        })
    }
}
