use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use betterBT::error::UpstreamError;
use betterBT::handlers::http::{
    get_connections, get_dashboard, post_refresh, status_for, AppState, ConnectionStatus,
    PeriodQuery,
};
use betterBT::models::calendar::WorkCalendarConfig;
use betterBT::models::interval::{BusyInterval, BusySchedule};
use betterBT::service::calendar_service::CalendarSource;
use betterBT::service::dashboard_service::{DashboardCache, DashboardService};
use chrono::{DateTime, Utc};
use warp::http::StatusCode;
use warp::Reply;

struct CountingCalendar {
    calls: AtomicUsize,
    error: Option<UpstreamError>,
}

impl CountingCalendar {
    fn new(error: Option<UpstreamError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            error,
        })
    }
}

#[async_trait::async_trait]
impl CalendarSource for CountingCalendar {
    async fn get_busy_intervals(
        &self,
        person_ids: &[String],
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<BusySchedule, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(BusySchedule::from_intervals(
                person_ids
                    .iter()
                    .map(|person| {
                        BusyInterval::new(person, start, start + chrono::Duration::hours(2))
                    })
                    .collect(),
            )),
        }
    }
}

fn state(calendar: Arc<CountingCalendar>) -> AppState {
    let service = DashboardService::new(
        WorkCalendarConfig::default(),
        vec!["ann@firm.com".to_string()],
        calendar,
    );
    AppState::new(
        service,
        DashboardCache::new(Duration::from_secs(300)),
        ConnectionStatus {
            calendar: "fixture".to_string(),
            time_budget: None,
            tracked_staff: 1,
        },
    )
}

fn period(value: &str) -> PeriodQuery {
    PeriodQuery {
        period: Some(value.to_string()),
    }
}

#[tokio::test]
async fn dashboard_is_cached_until_refresh() {
    let calendar = CountingCalendar::new(None);
    let state = state(calendar.clone());

    let first = get_dashboard(period("week"), state.clone()).await.unwrap();
    assert_eq!(first.into_response().status(), StatusCode::OK);
    let second = get_dashboard(period("week"), state.clone()).await.unwrap();
    assert_eq!(second.into_response().status(), StatusCode::OK);
    assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);

    let daily = get_dashboard(period("day"), state.clone()).await.unwrap();
    assert_eq!(daily.into_response().status(), StatusCode::OK);
    assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);

    let refreshed = post_refresh(period("week"), state).await.unwrap();
    assert_eq!(refreshed.into_response().status(), StatusCode::OK);
    assert_eq!(calendar.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn upstream_errors_map_to_gateway_statuses() {
    let cases = [
        (UpstreamError::Auth("expired".to_string()), StatusCode::BAD_GATEWAY),
        (
            UpstreamError::RateLimit {
                message: "429".to_string(),
                retry_after: None,
            },
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (UpstreamError::Network("timeout".to_string()), StatusCode::GATEWAY_TIMEOUT),
    ];
    for (error, expected) in cases {
        assert_eq!(status_for(&error), expected);
        let calendar = CountingCalendar::new(Some(error));
        let response = get_dashboard(PeriodQuery::default(), state(calendar.clone()))
            .await
            .unwrap();
        assert_eq!(response.into_response().status(), expected);
    }
}

#[tokio::test]
async fn failed_runs_are_not_cached() {
    let calendar = CountingCalendar::new(Some(UpstreamError::Network("down".to_string())));
    let state = state(calendar.clone());

    let _ = get_dashboard(PeriodQuery::default(), state.clone()).await.unwrap();
    let _ = get_dashboard(PeriodQuery::default(), state).await.unwrap();
    assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_period_is_a_bad_request() {
    let calendar = CountingCalendar::new(None);
    let response = get_dashboard(period("month"), state(calendar.clone()))
        .await
        .unwrap();
    assert_eq!(response.into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(calendar.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connections_endpoint_responds() {
    let response = get_connections(state(CountingCalendar::new(None))).await.unwrap();
    assert_eq!(response.into_response().status(), StatusCode::OK);
}
