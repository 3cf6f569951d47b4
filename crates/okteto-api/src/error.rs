use thiserror::Error;

/// Errors returned by the Okteto API client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid okteto URL '{0}'")]
    InvalidUrl(String),

    /// The token was rejected by the server
    #[error("unauthorized: please run 'okteto context' and try again")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid log stream event: {0}")]
    InvalidEvent(String),

    /// The connection closed before the server reported the end of the stream
    #[error("log stream closed unexpectedly")]
    StreamInterrupted,

    #[error("operation cancelled")]
    Cancelled,
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
