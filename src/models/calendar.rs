use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

use super::period::PeriodKind;

pub const DEFAULT_HOURS_PER_DAY: f64 = 8.0;
pub const DEFAULT_LOOK_AHEAD_MONTHS: u32 = 1;
pub const MAX_LOOK_AHEAD_MONTHS: u32 = 6;
/// DST offsets change in multiples of 15 minutes.
const GAP_STEP_MINUTES: i64 = 15;

/// Work-calendar definition shared by every aggregation run of the process.
#[derive(Debug, Clone)]
pub struct WorkCalendarConfig {
    pub hours_per_day: f64,
    pub look_ahead_months: u32,
    pub timezone: Tz,
    pub week_start: Weekday,
    pub work_days: BTreeSet<u8>,
    pub holidays: BTreeSet<NaiveDate>,
}

impl Default for WorkCalendarConfig {
    fn default() -> Self {
        Self {
            hours_per_day: DEFAULT_HOURS_PER_DAY,
            look_ahead_months: DEFAULT_LOOK_AHEAD_MONTHS,
            timezone: chrono_tz::America::New_York,
            week_start: Weekday::Mon,
            work_days: [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
                .iter()
                .map(|d| d.num_days_from_monday() as u8)
                .collect(),
            holidays: BTreeSet::new(),
        }
    }
}

/// Half-open `[start, end)` aggregation horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookAheadWindow {
    pub first_day: NaiveDate,
    pub end_day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookAheadWindow {
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.first_day && day < self.end_day
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first_day
            .iter_days()
            .take_while(move |day| *day < self.end_day)
    }
}

impl WorkCalendarConfig {
    pub fn is_working_day(&self, day: NaiveDate) -> bool {
        self.work_days
            .contains(&(day.weekday().num_days_from_monday() as u8))
            && !self.holidays.contains(&day)
    }

    /// Start of `day` in the configured zone, as a UTC instant. When a DST jump
    /// skips midnight the day starts at its first valid local time.
    pub fn local_midnight(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(chrono::NaiveTime::MIN);
        let mut naive = midnight;
        while naive < midnight + Duration::days(1) {
            if let Some(local) = self.timezone.from_local_datetime(&naive).earliest() {
                return local.with_timezone(&Utc);
            }
            naive += Duration::minutes(GAP_STEP_MINUTES);
        }
        self.timezone.from_utc_datetime(&midnight).with_timezone(&Utc)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    pub fn window(&self, today: NaiveDate) -> LookAheadWindow {
        let end_day = today
            .checked_add_months(Months::new(self.look_ahead_months))
            .unwrap_or(NaiveDate::MAX);
        LookAheadWindow {
            first_day: today,
            end_day,
            start: self.local_midnight(today),
            end: self.local_midnight(end_day),
        }
    }

    /// First day of the period of `kind` that contains `day`.
    pub fn period_start(&self, day: NaiveDate, kind: PeriodKind) -> NaiveDate {
        match kind {
            PeriodKind::Day => day,
            PeriodKind::Week => {
                let offset = (7 + day.weekday().num_days_from_monday()
                    - self.week_start.num_days_from_monday())
                    % 7;
                day - Duration::days(offset as i64)
            }
        }
    }

    /// Working days in `[from, to)` that also fall inside `window`.
    pub fn working_days_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        window: &LookAheadWindow,
    ) -> u32 {
        from.iter_days()
            .take_while(|day| *day < to)
            .filter(|day| window.contains_day(*day) && self.is_working_day(*day))
            .count() as u32
    }
}
