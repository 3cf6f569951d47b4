use okteto_api::{KubeTokenResponse, OktetoInterface};
use okteto_types::ExecCredential;

use crate::error::ValidationError;

/// Request a dynamic token for `namespace` from the Okteto instance at `context`
pub async fn issue_token(
    client: &dyn OktetoInterface,
    context: &str,
    namespace: &str,
) -> Result<KubeTokenResponse, ValidationError> {
    if namespace.is_empty() {
        return Err(ValidationError::EmptyNamespace);
    }

    client
        .kubetoken()
        .get_kube_token(context, namespace)
        .await
        .map_err(|cause| ValidationError::RemoteCallFailed {
            action: "error getting kubetoken",
            cause,
        })
}

/// Render a token as the ExecCredential document kubectl reads from stdout
pub fn serialize_exec_credential(response: KubeTokenResponse) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ExecCredential::from(response))
}
