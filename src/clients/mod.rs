pub mod bigtime_client;
pub mod graph_client;
pub mod token;

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use tracing::debug;

use crate::error::UpstreamError;

/// Maps a non-success vendor response onto the upstream error taxonomy.
pub fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> UpstreamError {
    let message = if body.trim().is_empty() {
        format!("request failed with status {}", status)
    } else {
        format!("request failed with status {}: {}", status, body.trim())
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            UpstreamError::RateLimit {
                message,
                retry_after,
            }
        }
        _ => UpstreamError::Network(message),
    }
}

/// Reads the body once, returning it on success and a classified error otherwise.
pub async fn read_body(response: Response) -> Result<String, UpstreamError> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let text = response.text().await?;
    if !status.is_success() {
        debug!(%status, body = %text, "vendor request failed");
        return Err(classify_status(status, retry_after, &text));
    }
    Ok(text)
}
