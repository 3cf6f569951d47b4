use k8s_openapi::api::core::v1::Namespace;
use kube::Api;

/// Annotation okteto sets on namespaces it manages, holding the Okteto URL
pub const OKTETO_URL_ANNOTATION: &str = "dev.okteto.com/okteto-url";

/// Read the Okteto URL annotation of a namespace.
/// Returns `None` on any API error or when the annotation is missing.
pub async fn okteto_url_from_namespace(client: &kube::Client, namespace: &str) -> Option<String> {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.get(namespace).await {
        Ok(ns) => annotation_url(&ns),
        Err(e) => {
            tracing::debug!(namespace, "cannot read namespace: {e}");
            None
        }
    }
}

fn annotation_url(ns: &Namespace) -> Option<String> {
    ns.metadata
        .annotations
        .as_ref()?
        .get(OKTETO_URL_ANNOTATION)
        .filter(|url| !url.is_empty())
        .cloned()
}
