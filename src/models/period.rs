use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Day,
    #[default]
    Week,
}

impl PeriodKind {
    pub fn days(&self) -> i64 {
        match self {
            PeriodKind::Day => 1,
            PeriodKind::Week => 7,
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKind::Day => write!(f, "day"),
            PeriodKind::Week => write!(f, "week"),
        }
    }
}

impl FromStr for PeriodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(PeriodKind::Day),
            "week" | "weekly" => Ok(PeriodKind::Week),
            other => Err(format!("unknown period '{}', expected day or week", other)),
        }
    }
}

/// Booked and available hours of one person for one day or week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub person_id: String,
    pub period_start_date: NaiveDate,
    pub period_kind: PeriodKind,
    pub booked_hours: f64,
    pub capacity_hours: f64,
}

impl PeriodBucket {
    /// Unbooked capacity; overbooked periods have none.
    pub fn available_hours(&self) -> f64 {
        (self.capacity_hours - self.booked_hours).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationRecord {
    pub person_id: String,
    pub period_start_date: NaiveDate,
    pub period_kind: PeriodKind,
    pub utilization_pct: f64,
    pub no_scheduled_hours: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRollup {
    pub period_start_date: NaiveDate,
    pub period_kind: PeriodKind,
    pub total_booked: f64,
    pub total_capacity: f64,
    pub avg_utilization_pct: f64,
    /// People with a bucket in this period.
    pub staff_count: usize,
}

impl TeamRollup {
    /// Capacity minus bookings. Negative when the team is overbooked.
    pub fn free_hours(&self) -> f64 {
        self.total_capacity - self.total_booked
    }
}

/// Whole-window totals for one person, as shown in the staff table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffSummary {
    pub person_id: String,
    pub display_name: String,
    pub booked_hours: f64,
    pub available_hours: f64,
    pub capacity_hours: f64,
    pub utilization_pct: f64,
    /// Set when the calendar could not be read; the hours are then all zero.
    pub error: Option<String>,
}

/// Available hours per person for one working day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAvailability {
    pub date: NaiveDate,
    pub available: Vec<PersonHours>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonHours {
    pub person_id: String,
    pub hours: f64,
}

/// `jane.doe@firm.com` becomes `Jane Doe`.
pub fn display_name(person_id: &str) -> String {
    let local = person_id.split('@').next().unwrap_or(person_id);
    local
        .split(['.', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
