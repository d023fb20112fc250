use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::read_body;
use super::token::TokenProvider;
use crate::error::UpstreamError;
use crate::models::interval::{BusyInterval, BusySchedule, MailboxFailure};

const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
/// getSchedule accepts at most this many mailboxes per call.
const SCHEDULE_BATCH_SIZE: usize = 20;
const AVAILABILITY_INTERVAL_MINUTES: u32 = 60;
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleRequest<'a> {
    schedules: &'a [String],
    start_time: GraphDateTime,
    end_time: GraphDateTime,
    availability_view_interval: u32,
}

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    value: Vec<ScheduleInformation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleInformation {
    #[serde(default)]
    schedule_id: String,
    #[serde(default)]
    schedule_items: Vec<ScheduleItem>,
    error: Option<FreeBusyError>,
}

#[derive(Debug, Deserialize)]
struct ScheduleItem {
    #[serde(default)]
    status: String,
    start: Option<GraphDateTime>,
    end: Option<GraphDateTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyError {
    message: Option<String>,
    response_code: Option<String>,
}

/// Microsoft Graph calendar client built on `getSchedule`, which batches mailboxes.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphClient {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(tokens, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(tokens: Arc<dyn TokenProvider>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    pub async fn get_schedules(
        &self,
        person_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError> {
        let mut schedule = BusySchedule::default();
        for batch in person_ids.chunks(SCHEDULE_BATCH_SIZE) {
            let token = self.tokens.access_token().await?;
            // The first mailbox of the batch acts as the caller.
            let caller = &batch[0];
            let request = ScheduleRequest {
                schedules: batch,
                start_time: to_graph_datetime(start),
                end_time: to_graph_datetime(end),
                availability_view_interval: AVAILABILITY_INTERVAL_MINUTES,
            };
            debug!(caller = %caller, people = batch.len(), "requesting free/busy schedule");

            let response = self
                .http
                .post(format!("{}/users/{}/calendar/getSchedule", self.base_url, caller))
                .bearer_auth(token)
                .header("Prefer", "outlook.timezone=\"UTC\"")
                .json(&request)
                .send()
                .await?;
            let body = read_body(response).await?;
            schedule.extend(parse_schedule_response(&body)?);
        }
        Ok(schedule)
    }
}

fn to_graph_datetime(instant: DateTime<Utc>) -> GraphDateTime {
    GraphDateTime {
        date_time: instant.format("%Y-%m-%dT%H:%M:%S").to_string(),
        time_zone: "UTC".to_string(),
    }
}

fn parse_graph_datetime(value: &GraphDateTime) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(&value.date_time, GRAPH_DATETIME_FORMAT).ok()?;
    if value.time_zone.eq_ignore_ascii_case("UTC") || value.time_zone.is_empty() {
        return Some(naive.and_utc());
    }
    let tz: Tz = value.time_zone.parse().ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Busy items of every schedule in a getSchedule payload. Free and tentative
/// slots are not bookings. Mailboxes answered with an error are reported as unavailable.
pub fn parse_schedule_response(body: &str) -> Result<BusySchedule, UpstreamError> {
    let parsed: ScheduleResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Network(format!("unreadable getSchedule response: {}", e)))?;

    let mut result = BusySchedule::default();
    for schedule in parsed.value {
        if let Some(error) = &schedule.error {
            let code = error.response_code.as_deref().unwrap_or("unknown");
            let message = error.message.as_deref().unwrap_or("no schedule returned");
            warn!(
                person = %schedule.schedule_id,
                code,
                detail = message,
                "calendar returned no schedule for person"
            );
            result.unavailable.push(MailboxFailure {
                person_id: schedule.schedule_id.clone(),
                message: format!("{} ({})", message, code),
            });
            continue;
        }
        for item in &schedule.schedule_items {
            let status = item.status.to_lowercase();
            if status == "free" || status == "tentative" {
                continue;
            }
            let start = item.start.as_ref().and_then(parse_graph_datetime);
            let end = item.end.as_ref().and_then(parse_graph_datetime);
            match (start, end) {
                (Some(start), Some(end)) => result
                    .intervals
                    .push(BusyInterval::new(&schedule.schedule_id, start, end)),
                _ => warn!(
                    person = %schedule.schedule_id,
                    "skipping schedule item with unreadable times"
                ),
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "value": [
            {
                "scheduleId": "ann@firm.com",
                "availabilityView": "0220",
                "scheduleItems": [
                    {
                        "status": "busy",
                        "start": {"dateTime": "2026-10-19T13:00:00.0000000", "timeZone": "UTC"},
                        "end": {"dateTime": "2026-10-19T15:30:00.0000000", "timeZone": "UTC"}
                    },
                    {
                        "status": "tentative",
                        "start": {"dateTime": "2026-10-19T16:00:00.0000000", "timeZone": "UTC"},
                        "end": {"dateTime": "2026-10-19T17:00:00.0000000", "timeZone": "UTC"}
                    },
                    {
                        "status": "oof",
                        "start": {"dateTime": "2026-10-20T09:00:00.0000000", "timeZone": "America/New_York"},
                        "end": {"dateTime": "2026-10-20T17:00:00.0000000", "timeZone": "America/New_York"}
                    },
                    {
                        "status": "busy",
                        "start": {"dateTime": "not a date", "timeZone": "UTC"},
                        "end": {"dateTime": "2026-10-20T17:00:00.0000000", "timeZone": "UTC"}
                    }
                ]
            },
            {
                "scheduleId": "ghost@firm.com",
                "error": {"message": "mailbox not found", "responseCode": "ErrorMailboxNotFound"}
            }
        ]
    }"#;

    #[test]
    fn parses_busy_items_and_skips_the_rest() {
        let schedule = parse_schedule_response(PAYLOAD).expect("payload should parse");
        let intervals = &schedule.intervals;
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].person_id, "ann@firm.com");
        assert_eq!(intervals[0].hours(), 2.5);
        assert_eq!(
            intervals[1].start,
            Utc.with_ymd_and_hms(2026, 10, 20, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn mailbox_errors_are_reported_per_person() {
        let schedule = parse_schedule_response(PAYLOAD).expect("payload should parse");
        assert_eq!(
            schedule.unavailable,
            vec![MailboxFailure {
                person_id: "ghost@firm.com".to_string(),
                message: "mailbox not found (ErrorMailboxNotFound)".to_string(),
            }]
        );
        assert!(schedule.is_unavailable("ghost@firm.com"));
        assert!(!schedule.is_unavailable("ann@firm.com"));
    }

    #[test]
    fn garbage_payload_is_a_network_error() {
        assert!(matches!(
            parse_schedule_response("<html>"),
            Err(UpstreamError::Network(_))
        ));
    }

    #[test]
    fn request_times_are_utc() {
        let instant = Utc.with_ymd_and_hms(2026, 10, 16, 4, 0, 0).unwrap();
        let value = to_graph_datetime(instant);
        assert_eq!(value.date_time, "2026-10-16T04:00:00");
        assert_eq!(parse_graph_datetime(&value), Some(instant));
    }
}
