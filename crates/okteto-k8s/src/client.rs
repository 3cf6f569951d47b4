use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};

use crate::annotation::okteto_url_from_namespace;
use crate::{K8sClientProvider, OktetoUrlLookup};

/// Namespace used when a kube-context doesn't configure one
const DEFAULT_NAMESPACE: &str = "default";

/// Kubernetes client wrapper
pub struct KubeClient {
    kubeconfig: Kubeconfig,
}

impl KubeClient {
    /// Create a new KubeClient by loading the kubeconfig
    /// (`$KUBECONFIG` or `~/.kube/config`)
    pub fn new() -> Result<Self> {
        let kubeconfig =
            Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?;

        Ok(Self::from_kubeconfig(kubeconfig))
    }

    /// Load the kubeconfig, falling back to an empty one when it can't be
    /// read. Kube-context lookups then find nothing.
    pub fn new_or_empty() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::debug!("continuing without kubeconfig: {e:#}");
            Self::from_kubeconfig(Kubeconfig::default())
        })
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        Self { kubeconfig }
    }

    /// Whether the kubeconfig defines the given context
    pub fn has_context(&self, context_name: &str) -> bool {
        self.kubeconfig
            .contexts
            .iter()
            .any(|c| c.name == context_name)
    }
}

#[async_trait]
impl K8sClientProvider for KubeClient {
    async fn provide(&self, context_name: &str) -> Result<kube::Client> {
        let config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: Some(context_name.to_string()),
                ..Default::default()
            },
        )
        .await
        .context(format!(
            "Failed to create config for context: {}",
            context_name
        ))?;

        kube::Client::try_from(config).context(format!(
            "Failed to create client for context: {}",
            context_name
        ))
    }

    fn context_namespace(&self, context_name: &str) -> Option<String> {
        self.kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .and_then(|c| c.context.as_ref())
            .and_then(|c| c.namespace.clone())
    }
}

#[async_trait]
impl OktetoUrlLookup for KubeClient {
    async fn okteto_url(&self, k8s_context: &str) -> Option<String> {
        if !self.has_context(k8s_context) {
            tracing::debug!(context = k8s_context, "kube-context not found in kubeconfig");
            return None;
        }

        let namespace = self
            .context_namespace(k8s_context)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let client = match self.provide(k8s_context).await {
            Ok(client) => client,
            Err(e) => {
                tracing::debug!(context = k8s_context, "cannot build kubernetes client: {e:#}");
                return None;
            }
        };

        okteto_url_from_namespace(&client, &namespace).await
    }
}
