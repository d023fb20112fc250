use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBudget {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub budget_hours: f64,
    pub logged_hours: f64,
    #[serde(default)]
    pub task_count: usize,
}

impl ProjectBudget {
    pub fn remaining_hours(&self) -> f64 {
        self.budget_hours - self.logged_hours
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    UnderCapacity,
    OverCapacity,
}

/// Team free hours against the work still budgeted on active projects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetComparison {
    pub total_remaining_hours: f64,
    pub team_free_hours: f64,
    /// Free minus remaining; negative means a deficit.
    pub gap_hours: f64,
    pub status: CapacityStatus,
    pub project_count: usize,
    pub staff_count: usize,
}

impl BudgetComparison {
    pub fn deficit_hours(&self) -> f64 {
        (-self.gap_hours).max(0.0)
    }

    pub fn surplus_hours(&self) -> f64 {
        self.gap_hours.max(0.0)
    }
}
