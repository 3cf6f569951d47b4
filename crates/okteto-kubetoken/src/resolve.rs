use std::collections::HashMap;
use std::sync::Arc;

use okteto_k8s::OktetoUrlLookup;
use okteto_types::ContextStore;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::ValidationError;

/// Whether `identifier` is an absolute URL with both a scheme and a host
pub fn is_url(identifier: &str) -> bool {
    Url::parse(identifier)
        .map(|u| !u.scheme().is_empty() && u.has_host())
        .unwrap_or(false)
}

/// Normalizes context identifiers to the name they are stored under
pub struct ContextResolver {
    store: Arc<ContextStore>,
    lookup: Arc<dyn OktetoUrlLookup>,

    /// Kube-context names mapped through `lookup`, one lookup per name
    mapped: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl ContextResolver {
    pub fn new(store: Arc<ContextStore>, lookup: Arc<dyn OktetoUrlLookup>) -> Self {
        Self {
            store,
            lookup,
            mapped: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Resolve a URL or kube-context name into its canonical identifier.
    ///
    /// Bare names are matched against the store first, then mapped through the
    /// kubernetes lookup. Names nothing knows about are returned unchanged.
    pub async fn resolve(&self, identifier: &str) -> Result<String, ValidationError> {
        if identifier.is_empty() {
            return Err(ValidationError::EmptyContext);
        }
        if is_url(identifier) || self.store.get(identifier).is_some() {
            return Ok(identifier.to_string());
        }
        if let Some(name) = self.store.find_by_k8s_name(identifier) {
            tracing::debug!("context '{identifier}' maps to stored context '{name}'");
            return Ok(name.to_string());
        }

        let cell = self
            .mapped
            .lock()
            .entry(identifier.to_string())
            .or_default()
            .clone();

        let resolved = cell
            .get_or_init(|| async {
                match self.lookup.okteto_url(identifier).await {
                    Some(url) if !url.is_empty() => {
                        tracing::debug!("kube-context '{identifier}' belongs to '{url}'");
                        url
                    }
                    _ => identifier.to_string(),
                }
            })
            .await;
        Ok(resolved.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeUrlLookup;
    use okteto_types::OktetoContext;
    use std::time::Duration;

    fn store() -> Arc<ContextStore> {
        let mut store = ContextStore::default();
        store.contexts.insert(
            "https://okteto.dev".to_string(),
            OktetoContext {
                name: "https://okteto.dev".to_string(),
                is_okteto: true,
                ..Default::default()
            },
        );
        store.contexts.insert(
            "minikube".to_string(),
            OktetoContext {
                name: "minikube".to_string(),
                ..Default::default()
            },
        );
        Arc::new(store)
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://okteto.dev"));
        assert!(is_url("http://localhost:8080/"));
        assert!(!is_url("okteto_dev"));
        assert!(!is_url("localhost:8080"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn test_resolve_empty_skips_lookup() {
        let lookup = FakeUrlLookup::new(Some("https://okteto.dev"));
        let resolver = ContextResolver::new(store(), lookup.clone());

        let err = resolver.resolve("").await.unwrap_err();
        assert!(matches!(err, ValidationError::EmptyContext));
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_url_and_stored_names() {
        let lookup = FakeUrlLookup::new(None);
        let resolver = ContextResolver::new(store(), lookup.clone());

        assert_eq!(
            resolver.resolve("https://okteto.dev").await.unwrap(),
            "https://okteto.dev"
        );
        assert_eq!(resolver.resolve("minikube").await.unwrap(), "minikube");
        assert_eq!(
            resolver.resolve("okteto_dev").await.unwrap(),
            "https://okteto.dev"
        );
        assert_eq!(lookup.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_through_lookup() {
        let lookup = FakeUrlLookup::new(Some("https://cloud.okteto.com"));
        let resolver = ContextResolver::new(store(), lookup.clone());

        assert_eq!(
            resolver.resolve("my-cluster").await.unwrap(),
            "https://cloud.okteto.com"
        );
        assert_eq!(
            resolver.resolve("my-cluster").await.unwrap(),
            "https://cloud.okteto.com"
        );
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolves_share_one_lookup() {
        let lookup = FakeUrlLookup::slow(Some("https://cloud.okteto.com"), Duration::from_secs(1));
        let resolver = ContextResolver::new(store(), lookup.clone());

        let (first, second) = tokio::join!(
            resolver.resolve("my-cluster"),
            resolver.resolve("my-cluster")
        );
        assert_eq!(first.unwrap(), "https://cloud.okteto.com");
        assert_eq!(second.unwrap(), "https://cloud.okteto.com");
        assert_eq!(lookup.calls(), 1);

        assert_eq!(resolver.resolve("other").await.unwrap(), "https://cloud.okteto.com");
        assert_eq!(lookup.calls(), 2);
    }

    #[tokio::test]
    async fn test_resolve_unknown_name_is_unchanged() {
        let resolver = ContextResolver::new(store(), FakeUrlLookup::new(None));
        assert_eq!(resolver.resolve("kind-dev").await.unwrap(), "kind-dev");
    }
}
