use chrono::{DateTime, Utc};
use serde::Serialize;

use super::budget::{BudgetComparison, ProjectBudget};
use super::calendar::LookAheadWindow;
use super::period::{DailyAvailability, PeriodBucket, PeriodKind, StaffSummary, TeamRollup, UtilizationRecord};
use super::interval::MailboxFailure;
use crate::error::{DataSource, UpstreamError};

/// An upstream failure that did not abort the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: DataSource,
    /// The one person affected, when the source failed only for them.
    pub person_id: Option<String>,
    pub kind: String,
    pub message: String,
    pub remediation: String,
}

impl SourceFailure {
    pub fn new(source: DataSource, error: &UpstreamError) -> Self {
        Self {
            source,
            person_id: None,
            kind: error.kind().to_string(),
            message: format!("{} error: {}", source, error),
            remediation: error.remediation(),
        }
    }

    /// A calendar that answered for everyone except `failure.person_id`.
    pub fn mailbox(failure: &MailboxFailure) -> Self {
        Self {
            source: DataSource::Calendar,
            person_id: Some(failure.person_id.clone()),
            kind: "mailbox".to_string(),
            message: format!(
                "{} error for {}: {}",
                DataSource::Calendar,
                failure.person_id,
                failure.message
            ),
            remediation: "Check the address in OUTLOOK_USERS and that the app may read this mailbox's calendar. \
                          This person is left out of capacity totals until then."
                .to_string(),
        }
    }
}

/// Everything the presentation layer renders for one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub window: LookAheadWindow,
    pub period_kind: PeriodKind,
    pub buckets: Vec<PeriodBucket>,
    pub utilization: Vec<UtilizationRecord>,
    pub team: Vec<TeamRollup>,
    pub staff: Vec<StaffSummary>,
    pub daily_availability: Vec<DailyAvailability>,
    pub projects: Vec<ProjectBudget>,
    pub budget_comparison: Option<BudgetComparison>,
    pub failures: Vec<SourceFailure>,
}
