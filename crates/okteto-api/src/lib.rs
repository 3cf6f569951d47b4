//! Okteto control plane API client
//!
//! This crate provides the HTTP client used to talk to an Okteto instance:
//! the kubetoken service and the server-sent event log streams.

mod client;
mod error;
mod kubetoken;
mod stream;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use client::{OktetoClient, OktetoClientFactory};
pub use error::ApiError;

// Re-export types used in our public API
pub use okteto_types::KubeTokenResponse;

/// Dynamic kubernetes token operations
#[async_trait]
pub trait KubetokenClient: Send + Sync {
    /// Check that the instance at `context` can issue dynamic tokens for `namespace`
    async fn check_service(&self, context: &str, namespace: &str) -> Result<(), ApiError>;

    /// Request a short-lived kubernetes token for `namespace`
    async fn get_kube_token(
        &self,
        context: &str,
        namespace: &str,
    ) -> Result<KubeTokenResponse, ApiError>;
}

/// Remote log streams. Each event payload is sent to `tx` as it arrives;
/// the call returns once the server reports the stream is done.
#[async_trait]
pub trait StreamClient: Send + Sync {
    async fn pipeline_logs(
        &self,
        cancel: CancellationToken,
        name: &str,
        namespace: &str,
        action: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError>;

    async fn destroy_all_logs(
        &self,
        cancel: CancellationToken,
        namespace: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError>;
}

/// A client bound to one Okteto instance
pub trait OktetoInterface: Send + Sync {
    fn kubetoken(&self) -> &dyn KubetokenClient;
    fn stream(&self) -> &dyn StreamClient;
}

/// Builds clients scoped to an Okteto URL and token
pub trait OktetoClientProvider: Send + Sync {
    fn provide(&self, url: &str, token: &str) -> Result<Arc<dyn OktetoInterface>, ApiError>;
}
