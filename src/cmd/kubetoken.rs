//! `okteto kubetoken`: exec credential plugin for okteto contexts

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use okteto_api::OktetoClientProvider;
use okteto_k8s::OktetoUrlLookup;
use okteto_kubetoken::{
    ContextResolver, PreReqValidator, ValidationError, issue_token, kubetoken_validators,
    serialize_exec_credential,
};
use okteto_types::{ContextDescriptor, ContextStore};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone, Default)]
pub struct KubetokenArgs {
    /// Okteto context URL or kube-context name
    #[arg(short, long, env = "OKTETO_CONTEXT", default_value = "")]
    pub context: String,

    /// Namespace the token is requested for
    #[arg(short, long, env = "OKTETO_NAMESPACE", default_value = "")]
    pub namespace: String,
}

pub struct KubetokenCmd {
    store: Arc<ContextStore>,
    lookup: Arc<dyn OktetoUrlLookup>,
    provider: Arc<dyn OktetoClientProvider>,
    timeout: Duration,
}

impl KubetokenCmd {
    pub fn new(
        store: Arc<ContextStore>,
        lookup: Arc<dyn OktetoUrlLookup>,
        provider: Arc<dyn OktetoClientProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            lookup,
            provider,
            timeout,
        }
    }

    /// Write the ExecCredential for `args` to `out`. Nothing is written on error.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        args: KubetokenArgs,
        token: Option<String>,
        out: &mut impl Write,
    ) -> Result<()> {
        let descriptor = ContextDescriptor::new(args.context, args.namespace).with_token(token);

        let credential = self
            .credential(cancel, descriptor)
            .await
            .context("dynamic kubernetes token cannot be requested")?;

        writeln!(out, "{credential}")?;
        out.flush()?;
        Ok(())
    }

    async fn credential(
        &self,
        cancel: &CancellationToken,
        mut descriptor: ContextDescriptor,
    ) -> Result<String> {
        let resolver = Arc::new(ContextResolver::new(
            Arc::clone(&self.store),
            Arc::clone(&self.lookup),
        ));

        let validators =
            kubetoken_validators(&descriptor, Arc::clone(&resolver), Arc::clone(&self.provider));
        PreReqValidator::new(validators)
            .with_timeout(self.timeout)
            .validate(cancel)
            .await?;

        descriptor.identifier = resolver.resolve(&descriptor.identifier).await?;
        tracing::debug!("requesting kubetoken for context '{}'", descriptor.identifier);

        // Flags and OKTETO_TOKEN take precedence over the saved session
        let session = self.store.get(&descriptor.identifier);
        let token = match (&descriptor.token, session) {
            (Some(token), _) => token.clone(),
            (None, Some(ctx)) => ctx.token.clone(),
            (None, None) => String::new(),
        };
        if descriptor.namespace.is_empty() {
            descriptor.namespace = session.map(|ctx| ctx.namespace.clone()).unwrap_or_default();
        }

        let client = self
            .provider
            .provide(&descriptor.identifier, &token)
            .map_err(|cause| ValidationError::RemoteCallFailed {
                action: "error creating okteto client",
                cause,
            })?;

        let response =
            issue_token(client.as_ref(), &descriptor.identifier, &descriptor.namespace).await?;

        Ok(serialize_exec_credential(response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use okteto_kubetoken::testing::{FakeClientProvider, FakeOktetoClient, FakeUrlLookup};
    use okteto_types::OktetoContext;
    use serde_json::Value;

    fn store(namespace: &str) -> Arc<ContextStore> {
        let mut store = ContextStore::default();
        store.contexts.insert(
            "https://okteto.dev".to_string(),
            OktetoContext {
                name: "https://okteto.dev".to_string(),
                token: "stored-token".to_string(),
                namespace: namespace.to_string(),
                is_okteto: true,
                ..Default::default()
            },
        );
        Arc::new(store)
    }

    fn args(context: &str, namespace: &str) -> KubetokenArgs {
        KubetokenArgs {
            context: context.to_string(),
            namespace: namespace.to_string(),
        }
    }

    #[tokio::test]
    async fn test_prints_exec_credential() {
        let provider = FakeClientProvider::new(FakeOktetoClient::default());
        let cmd = KubetokenCmd::new(
            store(""),
            FakeUrlLookup::new(None),
            provider.clone(),
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        cmd.run(
            &CancellationToken::new(),
            args("https://okteto.dev", "namespace"),
            None,
            &mut out,
        )
        .await
        .unwrap();

        let credential: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(credential["kind"], "ExecCredential");
        assert_eq!(credential["status"]["token"], "test-token");
        assert_eq!(provider.client.check_calls(), 1);
        assert_eq!(provider.client.token_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_context_fails_fast() {
        let lookup = FakeUrlLookup::new(Some("https://okteto.dev"));
        let provider = FakeClientProvider::new(FakeOktetoClient::default());
        let cmd = KubetokenCmd::new(
            store("cindy"),
            lookup.clone(),
            provider.clone(),
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        let err = cmd
            .run(&CancellationToken::new(), args("", "namespace"), None, &mut out)
            .await
            .unwrap_err();

        let message = format!("{err:#}");
        assert!(message.starts_with("dynamic kubernetes token cannot be requested: "));
        assert!(message.contains("context name cannot be empty"));
        assert!(out.is_empty());
        assert_eq!(lookup.calls(), 0);
        assert_eq!(provider.provided(), 0);
    }

    #[tokio::test]
    async fn test_namespace_falls_back_to_session() {
        let provider = FakeClientProvider::new(FakeOktetoClient::default());
        let cmd = KubetokenCmd::new(
            store("cindy"),
            FakeUrlLookup::new(None),
            provider.clone(),
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        cmd.run(&CancellationToken::new(), args("okteto_dev", ""), None, &mut out)
            .await
            .unwrap();
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_namespace() {
        let provider = FakeClientProvider::new(FakeOktetoClient::default());
        let cmd = KubetokenCmd::new(
            store(""),
            FakeUrlLookup::new(None),
            provider.clone(),
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        let err = cmd
            .run(&CancellationToken::new(), args("https://okteto.dev", ""), None, &mut out)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").ends_with("namespace cannot be empty"));
        assert_eq!(provider.client.token_calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_instance() {
        let provider = FakeClientProvider::new(FakeOktetoClient {
            check_status: Some(404),
            ..Default::default()
        });
        let cmd = KubetokenCmd::new(
            store("cindy"),
            FakeUrlLookup::new(None),
            provider.clone(),
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        let result = cmd
            .run(&CancellationToken::new(), args("https://okteto.dev", "cindy"), None, &mut out)
            .await;
        assert!(result.is_err());
        assert!(out.is_empty());
        assert_eq!(provider.client.token_calls(), 0);
    }

    #[tokio::test]
    async fn test_explicit_token_for_unknown_context() {
        let provider = FakeClientProvider::new(FakeOktetoClient::default());
        let cmd = KubetokenCmd::new(
            Arc::new(ContextStore::default()),
            FakeUrlLookup::new(None),
            provider.clone(),
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        cmd.run(
            &CancellationToken::new(),
            args("https://okteto.example.com", "cindy"),
            Some("explicit".to_string()),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(provider.client.token_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_service_times_out() {
        let provider = FakeClientProvider::new(FakeOktetoClient {
            check_delay: Duration::from_secs(60),
            ..Default::default()
        });
        let cmd = KubetokenCmd::new(
            store("cindy"),
            FakeUrlLookup::new(None),
            provider,
            Duration::from_secs(3),
        );

        let mut out = Vec::new();
        let err = cmd
            .run(&CancellationToken::new(), args("https://okteto.dev", "cindy"), None, &mut out)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("timed out"));
    }
}
