use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use crate::clients::bigtime_client::BigTimeClient;
use crate::clients::graph_client::GraphClient;
use crate::clients::token::{ClientCredentialsTokenProvider, StaticTokenProvider, TokenProvider};
use crate::config::{CalendarSettings, GraphCredentials, Settings};
use crate::error::ConfigError;
use crate::handlers::http::{routes, AppState, ConnectionStatus};
use crate::service::budget_service::BigTimeBudgetService;
use crate::service::calendar_service::{CalendarSource, FixtureCalendarSource, GraphCalendarService};
use crate::service::dashboard_service::{DashboardCache, DashboardService};

/// Wires the configured vendor clients into a dashboard service.
pub fn build_service(settings: &Settings) -> Result<DashboardService, ConfigError> {
    let calendar: Arc<dyn CalendarSource> = match &settings.calendar {
        CalendarSettings::Fixture(path) => Arc::new(FixtureCalendarSource::from_file(path)?),
        CalendarSettings::Graph(credentials) => {
            let tokens: Arc<dyn TokenProvider> = match credentials {
                GraphCredentials::AccessToken(token) => Arc::new(StaticTokenProvider::new(token.clone())),
                GraphCredentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                } => Arc::new(ClientCredentialsTokenProvider::new(
                    tenant_id,
                    client_id.clone(),
                    client_secret.clone(),
                )),
            };
            Arc::new(GraphCalendarService::new(GraphClient::new(tokens)))
        }
    };

    let mut service = DashboardService::new(
        settings.work_calendar.clone(),
        settings.tracked_persons.clone(),
        calendar,
    );
    if let Some(bigtime) = &settings.bigtime {
        let client = BigTimeClient::new(bigtime.auth.clone(), bigtime.base_url.clone());
        service = service.with_budget_source(
            Arc::new(BigTimeBudgetService::new(client)),
            bigtime.firm_id.clone(),
        );
    }
    Ok(service)
}

pub fn connection_status(settings: &Settings) -> ConnectionStatus {
    ConnectionStatus {
        calendar: match &settings.calendar {
            CalendarSettings::Fixture(path) => format!("fixture ({})", path.display()),
            CalendarSettings::Graph(_) => "Outlook (Microsoft Graph)".to_string(),
        },
        time_budget: settings.bigtime.as_ref().map(|_| "BigTime".to_string()),
        tracked_staff: settings.tracked_persons.len(),
    }
}

pub async fn run_api(settings: Settings) -> anyhow::Result<()> {
    let service = build_service(&settings)?;
    let state = AppState::new(
        service,
        DashboardCache::new(settings.cache_ttl),
        connection_status(&settings),
    );

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("Dashboard API listening on http://{}", addr);
    warp::serve(routes(state)).run(addr).await;
    Ok(())
}
