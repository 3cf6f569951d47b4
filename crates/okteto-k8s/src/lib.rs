//! Kubernetes client for okteto
//!
//! This crate loads the user's kubeconfig, builds cluster clients for a
//! kube-context and maps kube-contexts created by okteto back to the Okteto
//! URL they belong to.

mod annotation;
mod client;

use async_trait::async_trait;

pub use annotation::{OKTETO_URL_ANNOTATION, okteto_url_from_namespace};
pub use client::KubeClient;

/// Builds cluster clients for a kube-context
#[async_trait]
pub trait K8sClientProvider: Send + Sync {
    /// Create a client for the given kube-context
    async fn provide(&self, context_name: &str) -> anyhow::Result<kube::Client>;

    /// Namespace configured for the kube-context in the kubeconfig
    fn context_namespace(&self, context_name: &str) -> Option<String>;
}

/// Translates a kube-context name into the Okteto URL it was created for.
///
/// Lookups may reach the cluster. Any failure is reported as `None`, which
/// callers treat as "no known mapping".
#[async_trait]
pub trait OktetoUrlLookup: Send + Sync {
    async fn okteto_url(&self, k8s_context: &str) -> Option<String>;
}
