use clap::{Parser, Subcommand};
use std::fmt::Write;

use crate::config::Settings;
use crate::models::budget::CapacityStatus;
use crate::models::dashboard::Dashboard;
use crate::models::period::{display_name, PeriodKind};
use crate::runtime;
use crate::service::aggregator::projects_by_urgency;

const URGENT_PROJECT_LIMIT: usize = 10;

#[derive(Parser)]
#[command(about = "Staffing dashboard: project budgets vs. calendar availability")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the dashboard JSON API.
    Serve,
    /// Run one refresh and print the tables.
    Report {
        #[arg(long, default_value = "week")]
        period: PeriodKind,
    },
}

pub async fn cli(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => runtime::run_api(settings).await,
        Commands::Report { period } => {
            let service = runtime::build_service(&settings)?;
            match service.refresh(service.today(), period).await {
                Ok(dashboard) => {
                    print!("{}", render_report(&dashboard));
                    Ok(())
                }
                Err(err) => {
                    let crate::error::RunError::Upstream { error, .. } = &err;
                    eprintln!("{}\n{}", err, error.remediation());
                    Err(err.into())
                }
            }
        }
    }
}

fn hours(value: f64) -> String {
    format!("{:.1}", value)
}

/// Plain-text rendering of a dashboard snapshot.
pub fn render_report(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Staffing dashboard {} to {} ({} view)",
        dashboard.window.first_day, dashboard.window.end_day, dashboard.period_kind
    );
    for failure in &dashboard.failures {
        let _ = writeln!(out, "! {} ({})", failure.message, failure.remediation);
    }

    let _ = writeln!(out, "\nStaff utilization");
    let _ = writeln!(
        out,
        "{:<24} {:>10} {:>10} {:>10} {:>8}",
        "Staff", "Booked", "Available", "Capacity", "Util %"
    );
    for staff in &dashboard.staff {
        if let Some(error) = &staff.error {
            let _ = writeln!(out, "{:<24} calendar unavailable: {}", staff.display_name, error);
            continue;
        }
        let _ = writeln!(
            out,
            "{:<24} {:>10} {:>10} {:>10} {:>8}",
            staff.display_name,
            hours(staff.booked_hours),
            hours(staff.available_hours),
            hours(staff.capacity_hours),
            hours(staff.utilization_pct)
        );
    }

    let _ = writeln!(out, "\nTeam by {}", dashboard.period_kind);
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>10} {:>8}",
        "Starting", "Booked", "Capacity", "Util %"
    );
    for rollup in &dashboard.team {
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>10} {:>8}",
            rollup.period_start_date.to_string(),
            hours(rollup.total_booked),
            hours(rollup.total_capacity),
            hours(rollup.avg_utilization_pct)
        );
    }

    if let Some(first) = dashboard.daily_availability.first() {
        let _ = writeln!(out, "\nDaily available hours");
        let mut header = format!("{:<12}", "Date");
        for person in &first.available {
            let _ = write!(header, " {:>12}", display_name(&person.person_id));
        }
        let _ = writeln!(out, "{}", header.trim_end());
        for day in &dashboard.daily_availability {
            let mut row = format!("{:<12}", day.date.to_string());
            for person in &day.available {
                let _ = write!(row, " {:>12}", hours(person.hours));
            }
            let _ = writeln!(out, "{}", row);
        }
    }

    if let Some(comparison) = &dashboard.budget_comparison {
        let _ = writeln!(out, "\nBudget vs. capacity");
        let _ = writeln!(
            out,
            "Remaining project hours: {}",
            hours(comparison.total_remaining_hours)
        );
        let _ = writeln!(out, "Team free hours: {}", hours(comparison.team_free_hours));
        match comparison.status {
            CapacityStatus::UnderCapacity => {
                let _ = writeln!(
                    out,
                    "Surplus of {} hours across {} staff for {} projects",
                    hours(comparison.surplus_hours()),
                    comparison.staff_count,
                    comparison.project_count
                );
            }
            CapacityStatus::OverCapacity => {
                let _ = writeln!(
                    out,
                    "Deficit of {} hours across {} staff for {} projects",
                    hours(comparison.deficit_hours()),
                    comparison.staff_count,
                    comparison.project_count
                );
            }
        }

        let _ = writeln!(out, "\nProjects by urgency");
        for project in projects_by_urgency(&dashboard.projects, URGENT_PROJECT_LIMIT) {
            let _ = writeln!(
                out,
                "{:<32} {:>10} {:>10} {:>10}",
                project.name,
                hours(project.budget_hours),
                hours(project.logged_hours),
                hours(project.remaining_hours())
            );
        }
    }
    out
}
