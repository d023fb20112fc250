use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::models::budget::{BudgetComparison, CapacityStatus, ProjectBudget};
use crate::models::calendar::{LookAheadWindow, WorkCalendarConfig};
use crate::models::interval::BusyInterval;
use crate::models::period::{
    display_name, DailyAvailability, PeriodBucket, PeriodKind, PersonHours, StaffSummary,
    TeamRollup, UtilizationRecord,
};

struct Period {
    start_date: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    capacity_hours: f64,
}

/// Turns raw busy intervals into per-person period buckets over the look-ahead window.
pub struct AvailabilityAggregator<'a> {
    config: &'a WorkCalendarConfig,
    window: LookAheadWindow,
}

impl<'a> AvailabilityAggregator<'a> {
    pub fn new(config: &'a WorkCalendarConfig, today: NaiveDate) -> Self {
        Self {
            config,
            window: config.window(today),
        }
    }

    pub fn window(&self) -> LookAheadWindow {
        self.window
    }

    fn periods(&self, kind: PeriodKind) -> Vec<Period> {
        let mut periods = Vec::new();
        let mut day = self.config.period_start(self.window.first_day, kind);
        while day < self.window.end_day {
            let next = day + Duration::days(kind.days());
            let working_days = self.config.working_days_between(day, next, &self.window);
            periods.push(Period {
                start_date: day,
                start: self.config.local_midnight(day),
                end: self.config.local_midnight(next),
                capacity_hours: self.config.hours_per_day * working_days as f64,
            });
            day = next;
        }
        periods
    }

    /// One bucket per (person, period) for every tracked person and every person
    /// seen in a valid interval. Bad records are skipped, never fatal.
    pub fn bucket_by_period(
        &self,
        intervals: &[BusyInterval],
        tracked: &[String],
        kind: PeriodKind,
    ) -> Vec<PeriodBucket> {
        let periods = self.periods(kind);
        let mut booked: BTreeMap<String, Vec<f64>> = tracked
            .iter()
            .filter(|person| !person.trim().is_empty())
            .map(|person| (person.clone(), vec![0.0; periods.len()]))
            .collect();

        for interval in intervals {
            if let Err(reason) = interval.validate() {
                warn!(
                    person = %interval.person_id,
                    start = %interval.start,
                    end = %interval.end,
                    %reason,
                    "dropping malformed busy interval"
                );
                continue;
            }
            if !interval.overlaps(self.window.start, self.window.end) {
                warn!(
                    person = %interval.person_id,
                    start = %interval.start,
                    end = %interval.end,
                    "dropping busy interval outside the look-ahead window"
                );
                continue;
            }
            if interval.start < self.window.start || interval.end > self.window.end {
                debug!(
                    person = %interval.person_id,
                    start = %interval.start,
                    end = %interval.end,
                    "clipping busy interval to the look-ahead window"
                );
            }

            let slots = booked
                .entry(interval.person_id.clone())
                .or_insert_with(|| vec![0.0; periods.len()]);
            let clipped_start = interval.start.max(self.window.start);
            let clipped_end = interval.end.min(self.window.end);
            let first = periods.partition_point(|period| period.end <= clipped_start);
            for (idx, period) in periods.iter().enumerate().skip(first) {
                if period.start >= clipped_end {
                    break;
                }
                slots[idx] += interval.overlap_hours(
                    period.start.max(self.window.start),
                    period.end.min(self.window.end),
                );
            }
        }

        booked
            .into_iter()
            .flat_map(|(person_id, slots)| {
                periods
                    .iter()
                    .zip(slots)
                    .map(move |(period, booked_hours)| PeriodBucket {
                        person_id: person_id.clone(),
                        period_start_date: period.start_date,
                        period_kind: kind,
                        booked_hours,
                        capacity_hours: period.capacity_hours,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn percent(booked: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        booked / capacity * 100.0
    } else {
        0.0
    }
}

pub fn compute_utilization(buckets: &[PeriodBucket]) -> Vec<UtilizationRecord> {
    buckets
        .iter()
        .map(|bucket| UtilizationRecord {
            person_id: bucket.person_id.clone(),
            period_start_date: bucket.period_start_date,
            period_kind: bucket.period_kind,
            utilization_pct: percent(bucket.booked_hours, bucket.capacity_hours),
            no_scheduled_hours: bucket.capacity_hours <= 0.0,
        })
        .collect()
}

pub fn rollup_team(buckets: &[PeriodBucket]) -> Vec<TeamRollup> {
    let mut totals: BTreeMap<(PeriodKind, NaiveDate), (f64, f64, usize)> = BTreeMap::new();
    for bucket in buckets {
        let entry = totals
            .entry((bucket.period_kind, bucket.period_start_date))
            .or_insert((0.0, 0.0, 0));
        entry.0 += bucket.booked_hours;
        entry.1 += bucket.capacity_hours;
        entry.2 += 1;
    }
    totals
        .into_iter()
        .map(
            |((period_kind, period_start_date), (total_booked, total_capacity, staff_count))| {
                TeamRollup {
                    period_start_date,
                    period_kind,
                    total_booked,
                    total_capacity,
                    avg_utilization_pct: percent(total_booked, total_capacity),
                    staff_count,
                }
            },
        )
        .collect()
}

/// Coarse whole-window comparison; budget hours are not spread over weeks.
pub fn merge_budget_vs_capacity(
    team: &[TeamRollup],
    projects: &[ProjectBudget],
) -> BudgetComparison {
    let team_free_hours: f64 = team.iter().map(TeamRollup::free_hours).sum();
    let total_remaining_hours: f64 = projects.iter().map(ProjectBudget::remaining_hours).sum();
    let gap_hours = team_free_hours - total_remaining_hours;
    BudgetComparison {
        total_remaining_hours,
        team_free_hours,
        gap_hours,
        status: if gap_hours < 0.0 {
            CapacityStatus::OverCapacity
        } else {
            CapacityStatus::UnderCapacity
        },
        project_count: projects.len(),
        staff_count: team.iter().map(|rollup| rollup.staff_count).max().unwrap_or(0),
    }
}

pub fn summarize_staff(buckets: &[PeriodBucket]) -> Vec<StaffSummary> {
    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for bucket in buckets {
        let entry = totals.entry(bucket.person_id.as_str()).or_insert((0.0, 0.0));
        entry.0 += bucket.booked_hours;
        entry.1 += bucket.capacity_hours;
    }
    totals
        .into_iter()
        .map(|(person_id, (booked_hours, capacity_hours))| StaffSummary {
            person_id: person_id.to_string(),
            display_name: display_name(person_id),
            booked_hours,
            available_hours: (capacity_hours - booked_hours).max(0.0),
            capacity_hours,
            utilization_pct: percent(booked_hours, capacity_hours),
            error: None,
        })
        .collect()
}

/// Working-day grid of free hours per person. Expects day buckets.
pub fn daily_availability(buckets: &[PeriodBucket]) -> Vec<DailyAvailability> {
    let mut days: BTreeMap<NaiveDate, Vec<PersonHours>> = BTreeMap::new();
    for bucket in buckets {
        if bucket.period_kind != PeriodKind::Day || bucket.capacity_hours <= 0.0 {
            continue;
        }
        days.entry(bucket.period_start_date)
            .or_default()
            .push(PersonHours {
                person_id: bucket.person_id.clone(),
                hours: bucket.available_hours(),
            });
    }
    days.into_iter()
        .map(|(date, available)| DailyAvailability { date, available })
        .collect()
}

/// The `limit` projects with the fewest remaining hours.
pub fn projects_by_urgency(projects: &[ProjectBudget], limit: usize) -> Vec<ProjectBudget> {
    let mut ranked = projects.to_vec();
    ranked.sort_by(|a, b| a.remaining_hours().total_cmp(&b.remaining_hours()));
    ranked.truncate(limit);
    ranked
}
