use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use reqwest::StatusCode;

use super::read_body;
use crate::error::UpstreamError;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Supplies bearer tokens for the calendar API. The OAuth flow behind it is opaque.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, UpstreamError>;
}

pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, UpstreamError> {
        Ok(self.token.clone())
    }
}

/// The token endpoint answers bad client credentials with 400 rather than 401.
fn token_endpoint_error(status: StatusCode, err: UpstreamError) -> UpstreamError {
    match err {
        UpstreamError::Network(message) if status == StatusCode::BAD_REQUEST => {
            UpstreamError::Auth(message)
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct ClientCredentialsTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(tenant_id: &str, client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: format!("{}/{}/oauth2/v2.0/token", DEFAULT_AUTHORITY, tenant_id),
            client_id,
            client_secret,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn access_token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Utc::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = read_body(response)
            .await
            .map_err(|err| token_endpoint_error(status, err))?;
        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Auth(format!("unreadable token response: {}", e)))?;

        // Refresh a minute early.
        let expires_at = Utc::now() + Duration::seconds(parsed.expires_in - 60);
        *cached = Some((parsed.access_token.clone(), expires_at));
        Ok(parsed.access_token)
    }
}
