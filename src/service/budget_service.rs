use async_trait::async_trait;

use crate::clients::bigtime_client::BigTimeClient;
use crate::error::UpstreamError;
use crate::models::budget::ProjectBudget;

#[async_trait]
pub trait TimeBudgetSource: Send + Sync {
    async fn get_active_projects(&self, tenant_id: &str) -> Result<Vec<ProjectBudget>, UpstreamError>;
}

pub struct BigTimeBudgetService {
    client: BigTimeClient,
}

impl BigTimeBudgetService {
    pub fn new(client: BigTimeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TimeBudgetSource for BigTimeBudgetService {
    async fn get_active_projects(&self, tenant_id: &str) -> Result<Vec<ProjectBudget>, UpstreamError> {
        self.client.get_project_summaries(tenant_id).await
    }
}

pub struct FixtureBudgetSource {
    response: Result<Vec<ProjectBudget>, UpstreamError>,
}

impl FixtureBudgetSource {
    pub fn new(projects: Vec<ProjectBudget>) -> Self {
        Self {
            response: Ok(projects),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[async_trait]
impl TimeBudgetSource for FixtureBudgetSource {
    async fn get_active_projects(&self, _tenant_id: &str) -> Result<Vec<ProjectBudget>, UpstreamError> {
        self.response.clone()
    }
}
