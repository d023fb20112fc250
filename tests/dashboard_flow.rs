use std::sync::Arc;

use betterBT::error::{DataSource, RunError, UpstreamError};
use betterBT::models::budget::{CapacityStatus, ProjectBudget};
use betterBT::models::calendar::WorkCalendarConfig;
use betterBT::clients::graph_client::parse_schedule_response;
use betterBT::models::interval::{BusyInterval, BusySchedule};
use betterBT::models::period::PeriodKind;
use betterBT::service::budget_service::FixtureBudgetSource;
use betterBT::service::calendar_service::{CalendarSource, FixtureCalendarSource};
use betterBT::service::dashboard_service::DashboardService;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

struct FailingCalendar {
    error: UpstreamError,
}

#[async_trait::async_trait]
impl CalendarSource for FailingCalendar {
    async fn get_busy_intervals(
        &self,
        _person_ids: &[String],
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError> {
        Err(self.error.clone())
    }
}

/// Replays a canned getSchedule payload.
struct GraphPayloadCalendar {
    body: &'static str,
}

#[async_trait::async_trait]
impl CalendarSource for GraphPayloadCalendar {
    async fn get_busy_intervals(
        &self,
        _person_ids: &[String],
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError> {
        parse_schedule_response(self.body)
    }
}

fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn work_calendar() -> WorkCalendarConfig {
    WorkCalendarConfig {
        timezone: chrono_tz::UTC,
        ..WorkCalendarConfig::default()
    }
}

fn tracked() -> Vec<String> {
    vec![
        "ann@firm.com".to_string(),
        "bob@firm.com".to_string(),
        "cy@firm.com".to_string(),
    ]
}

fn calendar() -> Arc<FixtureCalendarSource> {
    Arc::new(FixtureCalendarSource::new(vec![
        BusyInterval::new("ann@firm.com", at(10, 19, 9), at(10, 19, 13)),
        BusyInterval::new("bob@firm.com", at(10, 20, 23), at(10, 21, 1)),
        BusyInterval::new("bob@firm.com", at(10, 22, 15), at(10, 22, 11)),
        BusyInterval::new("ann@firm.com", at(12, 1, 9), at(12, 1, 17)),
    ]))
}

fn project(id: &str, budget: f64, logged: f64) -> ProjectBudget {
    ProjectBudget {
        project_id: id.to_string(),
        name: format!("Project {}", id),
        code: id.to_string(),
        start_date: None,
        end_date: None,
        budget_hours: budget,
        logged_hours: logged,
        task_count: 1,
    }
}

#[tokio::test]
async fn refresh_builds_complete_grid_and_comparison() {
    let service = DashboardService::new(work_calendar(), tracked(), calendar()).with_budget_source(
        Arc::new(FixtureBudgetSource::new(vec![
            project("a", 80.0, 20.0),
            project("b", 500.0, 0.0),
        ])),
        "firm".to_string(),
    );

    let dashboard = service
        .refresh(today(), PeriodKind::Day)
        .await
        .expect("fixture refresh should succeed");

    assert_eq!(dashboard.buckets.len(), 3 * 31);
    let booked: f64 = dashboard.buckets.iter().map(|b| b.booked_hours).sum();
    assert_eq!(booked, 6.0);

    let bob_days: Vec<(NaiveDate, f64)> = dashboard
        .buckets
        .iter()
        .filter(|b| b.person_id == "bob@firm.com" && b.booked_hours > 0.0)
        .map(|b| (b.period_start_date, b.booked_hours))
        .collect();
    assert_eq!(
        bob_days,
        vec![
            (NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), 1.0),
            (NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(), 1.0),
        ]
    );

    let cy = dashboard
        .staff
        .iter()
        .find(|s| s.person_id == "cy@firm.com")
        .expect("tracked person without meetings still listed");
    assert_eq!(cy.booked_hours, 0.0);
    assert_eq!(cy.capacity_hours, 21.0 * 8.0);

    assert_eq!(dashboard.daily_availability.len(), 21);
    assert_eq!(dashboard.projects[0].project_id, "b");

    let comparison = dashboard.budget_comparison.expect("budget source configured");
    assert_eq!(comparison.staff_count, 3);
    assert_eq!(comparison.total_remaining_hours, 560.0);
    assert_eq!(comparison.team_free_hours, 3.0 * 21.0 * 8.0 - 6.0);
    assert_eq!(comparison.gap_hours, 498.0 - 560.0);
    assert_eq!(comparison.status, CapacityStatus::OverCapacity);
    assert!(dashboard.failures.is_empty());
}

#[tokio::test]
async fn weekly_view_keeps_daily_grid() {
    let service = DashboardService::new(work_calendar(), tracked(), calendar());

    let dashboard = service
        .refresh(today(), PeriodKind::Week)
        .await
        .expect("fixture refresh should succeed");

    assert!(dashboard.buckets.iter().all(|b| b.period_kind == PeriodKind::Week));
    assert_eq!(dashboard.daily_availability.len(), 21);
    let week = dashboard
        .team
        .iter()
        .find(|r| r.period_start_date == NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
        .unwrap();
    assert_eq!(week.total_booked, 6.0);
    assert_eq!(week.total_capacity, 120.0);
    assert!((week.avg_utilization_pct - 5.0).abs() < 1e-9);
    assert!(dashboard.budget_comparison.is_none());
}

#[tokio::test]
async fn budget_failure_is_reported_not_fatal() {
    let service = DashboardService::new(work_calendar(), tracked(), calendar()).with_budget_source(
        Arc::new(FixtureBudgetSource::failing(UpstreamError::Auth(
            "bad token".to_string(),
        ))),
        "firm".to_string(),
    );

    let dashboard = service
        .refresh(today(), PeriodKind::Week)
        .await
        .expect("calendar data is still served");

    assert!(dashboard.budget_comparison.is_none());
    assert!(dashboard.projects.is_empty());
    assert_eq!(dashboard.failures.len(), 1);
    assert_eq!(dashboard.failures[0].source, DataSource::TimeBudget);
    assert_eq!(dashboard.failures[0].kind, "auth");
    assert!(!dashboard.staff.is_empty());
}

#[tokio::test]
async fn calendar_failure_passes_through_unchanged() {
    let error = UpstreamError::RateLimit {
        message: "429".to_string(),
        retry_after: Some(60),
    };
    let service = DashboardService::new(
        work_calendar(),
        tracked(),
        Arc::new(FailingCalendar {
            error: error.clone(),
        }),
    );

    let result = service.refresh(today(), PeriodKind::Day).await;
    assert_eq!(
        result.err(),
        Some(RunError::Upstream {
            origin: DataSource::Calendar,
            error,
        })
    );
}

#[tokio::test]
async fn unreadable_mailbox_is_reported_and_not_counted_as_free() {
    let body = r#"{
        "value": [
            {
                "scheduleId": "ann@firm.com",
                "scheduleItems": [
                    {
                        "status": "busy",
                        "start": {"dateTime": "2026-10-19T09:00:00.0000000", "timeZone": "UTC"},
                        "end": {"dateTime": "2026-10-19T13:00:00.0000000", "timeZone": "UTC"}
                    }
                ]
            },
            {
                "scheduleId": "ghost@firm.com",
                "error": {"message": "mailbox not found", "responseCode": "ErrorMailboxNotFound"}
            }
        ]
    }"#;
    let service = DashboardService::new(
        work_calendar(),
        vec!["ann@firm.com".to_string(), "ghost@firm.com".to_string()],
        Arc::new(GraphPayloadCalendar { body }),
    )
    .with_budget_source(
        Arc::new(FixtureBudgetSource::new(vec![project("a", 100.0, 0.0)])),
        "firm".to_string(),
    );

    let dashboard = service
        .refresh(today(), PeriodKind::Week)
        .await
        .expect("one bad mailbox does not fail the run");

    assert_eq!(dashboard.failures.len(), 1);
    let failure = &dashboard.failures[0];
    assert_eq!(failure.source, DataSource::Calendar);
    assert_eq!(failure.person_id.as_deref(), Some("ghost@firm.com"));
    assert!(failure.message.contains("mailbox not found"));

    let ghost = dashboard
        .staff
        .iter()
        .find(|s| s.person_id == "ghost@firm.com")
        .expect("unreadable person is still listed");
    assert_eq!(ghost.capacity_hours, 0.0);
    assert_eq!(ghost.available_hours, 0.0);
    assert!(ghost.error.is_some());

    assert!(dashboard.buckets.iter().all(|b| b.person_id == "ann@firm.com"));
    let total_capacity: f64 = dashboard.team.iter().map(|r| r.total_capacity).sum();
    assert_eq!(total_capacity, 21.0 * 8.0);
    let comparison = dashboard.budget_comparison.expect("budget source configured");
    assert_eq!(comparison.team_free_hours, 21.0 * 8.0 - 4.0);
    assert_eq!(comparison.staff_count, 1);
}
