use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::error;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::error::{RunError, UpstreamError};
use crate::models::dashboard::Dashboard;
use crate::models::period::PeriodKind;
use crate::service::dashboard_service::{DashboardCache, DashboardService};

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
    pub kind: String,
    pub remediation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub calendar: String,
    pub time_budget: Option<String>,
    pub tracked_staff: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<DashboardService>,
    cache: Arc<Mutex<DashboardCache>>,
    connections: ConnectionStatus,
}

impl AppState {
    pub fn new(service: DashboardService, cache: DashboardCache, connections: ConnectionStatus) -> Self {
        Self {
            service: Arc::new(service),
            cache: Arc::new(Mutex::new(cache)),
            connections,
        }
    }
}

pub fn routes(state: AppState) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let dashboard = warp::path!("api" / "dashboard")
        .and(warp::get())
        .and(warp::query::<PeriodQuery>())
        .and(with_state(state.clone()))
        .and_then(get_dashboard);
    let refresh = warp::path!("api" / "refresh")
        .and(warp::post())
        .and(warp::query::<PeriodQuery>())
        .and(with_state(state.clone()))
        .and_then(post_refresh);
    let connections = warp::path!("api" / "connections")
        .and(warp::get())
        .and(with_state(state))
        .and_then(get_connections);

    dashboard.or(refresh).unify().or(connections).unify()
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub async fn get_dashboard(query: PeriodQuery, state: AppState) -> Result<Response, Infallible> {
    Ok(dashboard_response(query, &state, false).await)
}

pub async fn post_refresh(query: PeriodQuery, state: AppState) -> Result<Response, Infallible> {
    Ok(dashboard_response(query, &state, true).await)
}

pub async fn get_connections(state: AppState) -> Result<Response, Infallible> {
    Ok(warp::reply::json(&state.connections).into_response())
}

async fn dashboard_response(query: PeriodQuery, state: &AppState, force: bool) -> Response {
    let kind = match query.period.as_deref().map(str::parse::<PeriodKind>) {
        None => PeriodKind::default(),
        Some(Ok(kind)) => kind,
        Some(Err(reason)) => {
            let body = ErrorMessage {
                error: reason,
                kind: "bad_request".to_string(),
                remediation: "Use period=day or period=week.".to_string(),
            };
            return warp::reply::with_status(warp::reply::json(&body), StatusCode::BAD_REQUEST)
                .into_response();
        }
    };

    match load_dashboard(state, kind, force).await {
        Ok(dashboard) => warp::reply::json(&dashboard).into_response(),
        Err(err) => {
            error!(error = %err, "dashboard refresh failed");
            let RunError::Upstream { error: upstream, .. } = &err;
            let body = ErrorMessage {
                error: err.to_string(),
                kind: upstream.kind().to_string(),
                remediation: upstream.remediation(),
            };
            warp::reply::with_status(warp::reply::json(&body), status_for(upstream)).into_response()
        }
    }
}

/// Serves from the cache unless `force` is set. Holding the cache lock keeps
/// refreshes to one run at a time.
async fn load_dashboard(state: &AppState, kind: PeriodKind, force: bool) -> Result<Dashboard, RunError> {
    let mut cache = state.cache.lock().await;
    let today = state.service.today();
    if force {
        cache.clear();
    } else if let Some(dashboard) = cache.get(kind, today, Instant::now()) {
        return Ok(dashboard);
    }
    let dashboard = state.service.refresh(today, kind).await?;
    cache.put(kind, today, dashboard.clone(), Instant::now());
    Ok(dashboard)
}

pub fn status_for(error: &UpstreamError) -> StatusCode {
    match error {
        UpstreamError::Auth(_) => StatusCode::BAD_GATEWAY,
        UpstreamError::RateLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
        UpstreamError::Network(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}
