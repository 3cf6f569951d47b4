use std::time::Duration;

use async_trait::async_trait;
use okteto_types::KubeTokenResponse;

use crate::KubetokenClient;
use crate::client::{OktetoClient, endpoint, error_for_status};
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
impl KubetokenClient for OktetoClient {
    async fn check_service(&self, context: &str, namespace: &str) -> Result<(), ApiError> {
        let url = endpoint(context, &["auth", "kubetoken", namespace])?;
        tracing::debug!(%url, "checking kubetoken service");

        let response = self.get(url).timeout(REQUEST_TIMEOUT).send().await?;
        error_for_status(response).await?;
        Ok(())
    }

    async fn get_kube_token(
        &self,
        context: &str,
        namespace: &str,
    ) -> Result<KubeTokenResponse, ApiError> {
        let url = endpoint(context, &["auth", "kubetoken", namespace])?;
        tracing::debug!(%url, "requesting kubetoken");

        let response = self.get(url).timeout(REQUEST_TIMEOUT).send().await?;
        let body = error_for_status(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
