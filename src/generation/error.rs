use reqwest::Response;
use thiserror::Error;
use tracing::error;

/// Failure raised by a generation backend mid-stream
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Malformed provider output: {0}")]
    Malformed(String),
    #[error("No data from provider for {0}s")]
    Timeout(u64),
}

/// Hands back `res` untouched on a 2xx, otherwise reads the error body into
/// [`BackendError::Status`].
pub async fn check_status(res: Response, provider: &str) -> Result<Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    error!("{} returned status {}: {}", provider, status, body);
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}
