use std::sync::Arc;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use url::Url;

use crate::error::ApiError;
use crate::{KubetokenClient, OktetoClientProvider, OktetoInterface, StreamClient};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for one Okteto instance
pub struct OktetoClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    token: String,
}

impl OktetoClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        // Reject malformed URLs up front instead of on the first request
        endpoint(base_url, &[])?;

        let http = reqwest::Client::builder()
            .user_agent(user_agent())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token: token.to_string(),
        })
    }

    /// GET request carrying the bearer token
    pub(crate) fn get(&self, url: Url) -> reqwest::RequestBuilder {
        self.http.get(url).bearer_auth(&self.token)
    }
}

impl OktetoInterface for OktetoClient {
    fn kubetoken(&self) -> &dyn KubetokenClient {
        self
    }

    fn stream(&self) -> &dyn StreamClient {
        self
    }
}

/// Default provider building real HTTP clients
#[derive(Clone, Copy, Debug, Default)]
pub struct OktetoClientFactory;

impl OktetoClientProvider for OktetoClientFactory {
    fn provide(&self, url: &str, token: &str) -> Result<Arc<dyn OktetoInterface>, ApiError> {
        Ok(Arc::new(OktetoClient::new(url, token)?))
    }
}

/// Returns the okteto User-Agent string
pub(crate) fn user_agent() -> String {
    format!("okteto/{}", env!("CARGO_PKG_VERSION"))
}

/// Join path segments onto an Okteto base URL, percent-encoding each one
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = Url::parse(base).map_err(|_| ApiError::InvalidUrl(base.to_string()))?;
    if url.host_str().is_none() {
        return Err(ApiError::InvalidUrl(base.to_string()));
    }
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map non-success responses to an `ApiError`
pub(crate) async fn error_for_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = response.text().await.unwrap_or_default();
    Err(status_error(status, url, message))
}

fn status_error(status: StatusCode, url: String, message: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden(url),
        StatusCode::NOT_FOUND => ApiError::NotFound(url),
        _ => ApiError::Status {
            status: status.as_u16(),
            message: message.trim().to_string(),
        },
    }
}
