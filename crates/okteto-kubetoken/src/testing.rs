//! In-memory fakes of the API and kubernetes collaborators

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use okteto_api::{
    ApiError, KubeTokenResponse, KubetokenClient, OktetoClientProvider, OktetoInterface,
    StreamClient,
};
use okteto_k8s::OktetoUrlLookup;
use okteto_types::TokenStatus;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Kube-context lookup answering every name with the same URL
pub struct FakeUrlLookup {
    url: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeUrlLookup {
    pub fn new(url: Option<&str>) -> Arc<Self> {
        Self::slow(url, Duration::ZERO)
    }

    /// A lookup that takes `delay` to answer
    pub fn slow(url: Option<&str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            url: url.map(str::to_string),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OktetoUrlLookup for FakeUrlLookup {
    async fn okteto_url(&self, _k8s_context: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.url.clone()
    }
}

/// Okteto API fake. `check_status` is the HTTP status the kubetoken service
/// answers with, `None` meaning success. Log streams emit `logs` and finish.
pub struct FakeOktetoClient {
    pub check_status: Option<u16>,
    pub check_delay: Duration,
    pub token: String,
    pub logs: Vec<String>,
    pub check_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
}

impl Default for FakeOktetoClient {
    fn default() -> Self {
        Self {
            check_status: None,
            check_delay: Duration::ZERO,
            token: "test-token".to_string(),
            logs: Vec::new(),
            check_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeOktetoClient {
    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    fn emit_logs(&self, tx: &mpsc::UnboundedSender<String>) {
        for line in &self.logs {
            let _ = tx.send(line.clone());
        }
    }

    fn status_error(&self, context: &str) -> Option<ApiError> {
        let status = self.check_status?;
        Some(match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(context.to_string()),
            404 => ApiError::NotFound(context.to_string()),
            _ => ApiError::Status {
                status,
                message: "fake failure".to_string(),
            },
        })
    }
}

#[async_trait]
impl KubetokenClient for FakeOktetoClient {
    async fn check_service(&self, context: &str, _namespace: &str) -> Result<(), ApiError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if !self.check_delay.is_zero() {
            tokio::time::sleep(self.check_delay).await;
        }
        match self.status_error(context) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_kube_token(
        &self,
        context: &str,
        _namespace: &str,
    ) -> Result<KubeTokenResponse, ApiError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.status_error(context) {
            return Err(err);
        }
        Ok(KubeTokenResponse {
            status: TokenStatus {
                token: self.token.clone(),
                expiration_timestamp: None,
            },
            ..Default::default()
        })
    }
}

#[async_trait]
impl StreamClient for FakeOktetoClient {
    async fn pipeline_logs(
        &self,
        _cancel: CancellationToken,
        _name: &str,
        _namespace: &str,
        _action: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError> {
        self.emit_logs(tx);
        Ok(())
    }

    async fn destroy_all_logs(
        &self,
        _cancel: CancellationToken,
        _namespace: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError> {
        self.emit_logs(tx);
        Ok(())
    }
}

impl OktetoInterface for FakeOktetoClient {
    fn kubetoken(&self) -> &dyn KubetokenClient {
        self
    }

    fn stream(&self) -> &dyn StreamClient {
        self
    }
}

/// Hands out the same fake client for every URL
pub struct FakeClientProvider {
    pub client: Arc<FakeOktetoClient>,
    provided: AtomicUsize,
}

impl FakeClientProvider {
    pub fn new(client: FakeOktetoClient) -> Arc<Self> {
        Arc::new(Self {
            client: Arc::new(client),
            provided: AtomicUsize::new(0),
        })
    }

    /// Number of clients built, i.e. how many times the network was reached for
    pub fn provided(&self) -> usize {
        self.provided.load(Ordering::SeqCst)
    }
}

impl OktetoClientProvider for FakeClientProvider {
    fn provide(&self, url: &str, _token: &str) -> Result<Arc<dyn OktetoInterface>, ApiError> {
        if url.is_empty() {
            return Err(ApiError::InvalidUrl(url.to_string()));
        }
        self.provided.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }
}
