use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use super::aggregator::{
    compute_utilization, daily_availability, merge_budget_vs_capacity, rollup_team,
    summarize_staff, AvailabilityAggregator,
};
use super::budget_service::TimeBudgetSource;
use super::calendar_service::CalendarSource;
use crate::error::{DataSource, RunError};
use crate::models::calendar::WorkCalendarConfig;
use crate::models::dashboard::{Dashboard, SourceFailure};
use crate::models::period::{display_name, PeriodKind, StaffSummary};

struct BudgetFeed {
    source: Arc<dyn TimeBudgetSource>,
    tenant_id: String,
}

/// Runs the fetch + aggregate pipeline for one refresh.
pub struct DashboardService {
    work_calendar: WorkCalendarConfig,
    tracked: Vec<String>,
    calendar: Arc<dyn CalendarSource>,
    budgets: Option<BudgetFeed>,
}

impl DashboardService {
    pub fn new(
        work_calendar: WorkCalendarConfig,
        tracked: Vec<String>,
        calendar: Arc<dyn CalendarSource>,
    ) -> Self {
        Self {
            work_calendar,
            tracked,
            calendar,
            budgets: None,
        }
    }

    pub fn with_budget_source(mut self, source: Arc<dyn TimeBudgetSource>, tenant_id: String) -> Self {
        self.budgets = Some(BudgetFeed { source, tenant_id });
        self
    }

    pub fn work_calendar(&self) -> &WorkCalendarConfig {
        &self.work_calendar
    }

    /// Current date in the configured work zone.
    pub fn today(&self) -> NaiveDate {
        self.work_calendar.local_date(Utc::now())
    }

    pub async fn refresh(&self, today: NaiveDate, kind: PeriodKind) -> Result<Dashboard, RunError> {
        let aggregator = AvailabilityAggregator::new(&self.work_calendar, today);
        let window = aggregator.window();
        info!(
            people = self.tracked.len(),
            start = %window.start,
            end = %window.end,
            period = %kind,
            "refreshing dashboard"
        );

        let schedule = self
            .calendar
            .get_busy_intervals(&self.tracked, window.start, window.end)
            .await
            .map_err(|error| RunError::Upstream {
                origin: DataSource::Calendar,
                error,
            })?;

        // Unreadable calendars must not count as free capacity.
        let mut failures: Vec<SourceFailure> =
            schedule.unavailable.iter().map(SourceFailure::mailbox).collect();
        let tracked: Vec<String> = self
            .tracked
            .iter()
            .filter(|person| !schedule.is_unavailable(person))
            .cloned()
            .collect();
        let intervals: Vec<_> = schedule
            .intervals
            .iter()
            .filter(|interval| !schedule.is_unavailable(&interval.person_id))
            .cloned()
            .collect();
        if !schedule.unavailable.is_empty() {
            warn!(
                unavailable = schedule.unavailable.len(),
                "leaving people with unreadable calendars out of capacity"
            );
        }

        let projects = match &self.budgets {
            Some(feed) => match feed.source.get_active_projects(&feed.tenant_id).await {
                Ok(mut projects) => {
                    projects.sort_by(|a, b| b.remaining_hours().total_cmp(&a.remaining_hours()));
                    Some(projects)
                }
                Err(error) => {
                    warn!(%error, "time-budget fetch failed, showing calendar data only");
                    failures.push(SourceFailure::new(DataSource::TimeBudget, &error));
                    None
                }
            },
            None => None,
        };

        let buckets = aggregator.bucket_by_period(&intervals, &tracked, kind);
        let day_buckets = match kind {
            PeriodKind::Day => buckets.clone(),
            PeriodKind::Week => aggregator.bucket_by_period(&intervals, &tracked, PeriodKind::Day),
        };
        let mut staff = summarize_staff(&buckets);
        staff.extend(schedule.unavailable.iter().map(|failure| StaffSummary {
            person_id: failure.person_id.clone(),
            display_name: display_name(&failure.person_id),
            booked_hours: 0.0,
            available_hours: 0.0,
            capacity_hours: 0.0,
            utilization_pct: 0.0,
            error: Some(failure.message.clone()),
        }));
        let team = rollup_team(&buckets);
        let budget_comparison = projects
            .as_ref()
            .map(|projects| merge_budget_vs_capacity(&team, projects));

        info!(
            intervals = intervals.len(),
            buckets = buckets.len(),
            "dashboard refreshed"
        );
        Ok(Dashboard {
            generated_at: Utc::now(),
            window,
            period_kind: kind,
            utilization: compute_utilization(&buckets),
            staff,
            daily_availability: daily_availability(&day_buckets),
            team,
            buckets,
            projects: projects.unwrap_or_default(),
            budget_comparison,
            failures,
        })
    }
}

/// Short-lived snapshot cache, one entry per period kind and local day.
pub struct DashboardCache {
    ttl: Duration,
    entries: HashMap<(PeriodKind, NaiveDate), (Instant, Dashboard)>,
}

impl DashboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, kind: PeriodKind, today: NaiveDate, now: Instant) -> Option<Dashboard> {
        self.entries
            .get(&(kind, today))
            .filter(|(stored_at, _)| now.duration_since(*stored_at) < self.ttl)
            .map(|(_, dashboard)| dashboard.clone())
    }

    pub fn put(&mut self, kind: PeriodKind, today: NaiveDate, dashboard: Dashboard, now: Instant) {
        // Windows from earlier days are never served again.
        self.entries.retain(|(_, day), _| *day >= today);
        self.entries.insert((kind, today), (now, dashboard));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
