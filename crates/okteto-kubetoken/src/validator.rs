//! Pre-flight checks run before requesting a dynamic kubernetes token

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use okteto_api::OktetoClientProvider;
use okteto_types::ContextDescriptor;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::ValidationError;
use crate::resolve::ContextResolver;

/// Budget shared by all validators of one run
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(3);

/// A single pre-flight check
#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the check. Implementations return [`ValidationError::Cancelled`]
    /// promptly once `cancel` fires.
    async fn validate(&self, cancel: CancellationToken) -> Result<(), ValidationError>;
}

/// Race `check` against `cancel`
async fn cancellable<F>(cancel: &CancellationToken, check: F) -> Result<(), ValidationError>
where
    F: Future<Output = Result<(), ValidationError>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(ValidationError::Cancelled),
        result = check => result,
    }
}

/// Checks the context is known locally and belongs to an Okteto instance
pub struct ContextValidator {
    descriptor: ContextDescriptor,
    resolver: Arc<ContextResolver>,
}

impl ContextValidator {
    pub fn new(descriptor: ContextDescriptor, resolver: Arc<ContextResolver>) -> Self {
        Self {
            descriptor,
            resolver,
        }
    }

    async fn check(&self) -> Result<(), ValidationError> {
        let identifier = self.resolver.resolve(&self.descriptor.identifier).await?;

        match self.resolver.store().get(&identifier) {
            // An explicit token is checked by the server instead
            None if self.descriptor.has_token() => Ok(()),
            None => Err(ValidationError::ContextNotFound { identifier }),
            Some(ctx) if !ctx.is_okteto => Err(ValidationError::NotManagedContext { identifier }),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait]
impl Validator for ContextValidator {
    fn name(&self) -> &'static str {
        "context"
    }

    async fn validate(&self, cancel: CancellationToken) -> Result<(), ValidationError> {
        cancellable(&cancel, self.check()).await
    }
}

/// Checks the Okteto instance can issue dynamic tokens for the namespace
pub struct OktetoSupportValidator {
    descriptor: ContextDescriptor,
    resolver: Arc<ContextResolver>,
    provider: Arc<dyn OktetoClientProvider>,
}

impl OktetoSupportValidator {
    pub fn new(
        descriptor: ContextDescriptor,
        resolver: Arc<ContextResolver>,
        provider: Arc<dyn OktetoClientProvider>,
    ) -> Self {
        Self {
            descriptor,
            resolver,
            provider,
        }
    }

    async fn check(&self) -> Result<(), ValidationError> {
        let identifier = self.resolver.resolve(&self.descriptor.identifier).await?;
        let stored = self.resolver.store().get(&identifier);

        let token = match (&self.descriptor.token, stored) {
            (Some(token), _) => token.as_str(),
            (None, Some(ctx)) => ctx.token.as_str(),
            (None, None) => "",
        };
        let namespace = match stored {
            _ if !self.descriptor.namespace.is_empty() => self.descriptor.namespace.as_str(),
            Some(ctx) => ctx.namespace.as_str(),
            None => "",
        };

        let client = self.provider.provide(&identifier, token).map_err(|cause| {
            ValidationError::RemoteCallFailed {
                action: "error creating okteto client",
                cause,
            }
        })?;

        client
            .kubetoken()
            .check_service(&identifier, namespace)
            .await
            .map_err(|e| {
                ValidationError::from_service(e, "error checking kubetoken service", namespace)
            })
    }
}

#[async_trait]
impl Validator for OktetoSupportValidator {
    fn name(&self) -> &'static str {
        "okteto-support"
    }

    async fn validate(&self, cancel: CancellationToken) -> Result<(), ValidationError> {
        cancellable(&cancel, self.check()).await
    }
}

/// The checks required before requesting a dynamic kubernetes token
pub fn kubetoken_validators(
    descriptor: &ContextDescriptor,
    resolver: Arc<ContextResolver>,
    provider: Arc<dyn OktetoClientProvider>,
) -> Vec<Arc<dyn Validator>> {
    vec![
        Arc::new(ContextValidator::new(descriptor.clone(), resolver.clone())),
        Arc::new(OktetoSupportValidator::new(
            descriptor.clone(),
            resolver,
            provider,
        )),
    ]
}

/// Runs validators concurrently under one timeout.
///
/// The first failure cancels the remaining validators and becomes the result.
pub struct PreReqValidator {
    validators: Vec<Arc<dyn Validator>>,
    timeout: Duration,
}

impl PreReqValidator {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self {
            validators,
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn validate(&self, parent: &CancellationToken) -> Result<(), ValidationError> {
        if parent.is_cancelled() {
            return Err(ValidationError::Cancelled);
        }

        let cancel = parent.child_token();
        let _guard = cancel.clone().drop_guard();

        let mut tasks = JoinSet::new();
        for validator in &self.validators {
            let validator = Arc::clone(validator);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = validator.validate(cancel).await;
                (validator.name(), result)
            });
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut failure: Option<ValidationError> = None;
        loop {
            tokio::select! {
                biased;

                _ = parent.cancelled(), if failure.is_none() => {
                    failure = Some(ValidationError::Cancelled);
                    cancel.cancel();
                }
                _ = &mut deadline, if failure.is_none() => {
                    tracing::debug!("pre-flight validation timed out after {:?}", self.timeout);
                    failure = Some(ValidationError::Timeout(self.timeout));
                    cancel.cancel();
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((name, Ok(())))) => tracing::debug!("{name} validation passed"),
                    Some(Ok((name, Err(err)))) => {
                        tracing::debug!("{name} validation failed: {err}");
                        if failure.is_none() {
                            failure = Some(err);
                            cancel.cancel();
                        }
                    }
                    Some(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Some(Err(_)) => {}
                },
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClientProvider, FakeOktetoClient, FakeUrlLookup};
    use okteto_types::{ContextStore, OktetoContext};
    use tokio::time::{Instant, sleep};

    /// Sleeps for `delay`, then returns `fail` as an error or passes
    struct DelayedValidator {
        delay: Duration,
        fail: bool,
    }

    impl DelayedValidator {
        fn new(delay_ms: u64, fail: bool) -> Arc<dyn Validator> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                fail,
            })
        }
    }

    #[async_trait]
    impl Validator for DelayedValidator {
        fn name(&self) -> &'static str {
            "delayed"
        }

        async fn validate(&self, cancel: CancellationToken) -> Result<(), ValidationError> {
            cancellable(&cancel, async {
                sleep(self.delay).await;
                if self.fail {
                    return Err(ValidationError::ServiceUnsupported);
                }
                Ok(())
            })
            .await
        }
    }

    fn store() -> Arc<ContextStore> {
        let mut store = ContextStore::default();
        for (name, is_okteto) in [("https://okteto.dev", true), ("minikube", false)] {
            store.contexts.insert(
                name.to_string(),
                OktetoContext {
                    name: name.to_string(),
                    token: "stored-token".to_string(),
                    namespace: "cindy".to_string(),
                    is_okteto,
                    ..Default::default()
                },
            );
        }
        Arc::new(store)
    }

    fn resolver() -> Arc<ContextResolver> {
        Arc::new(ContextResolver::new(store(), FakeUrlLookup::new(None)))
    }

    async fn check_context(descriptor: ContextDescriptor) -> Result<(), ValidationError> {
        ContextValidator::new(descriptor, resolver())
            .validate(CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_context_validator() {
        let ok = ContextDescriptor::new("https://okteto.dev", "namespace");
        assert!(check_context(ok).await.is_ok());

        let err = check_context(ContextDescriptor::new("", "namespace"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::EmptyContext));

        let err = check_context(ContextDescriptor::new("https://other.dev", "namespace"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid context: context 'https://other.dev' not found in the okteto context store"
        );

        let err = check_context(ContextDescriptor::new("minikube", "namespace"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ValidationError::NotManagedContext { ref identifier } if identifier == "minikube")
        );
    }

    #[tokio::test]
    async fn test_context_validator_resolves_k8s_names() {
        let descriptor = ContextDescriptor::new("okteto_dev", "namespace");
        assert!(check_context(descriptor).await.is_ok());
    }

    #[tokio::test]
    async fn test_context_validator_explicit_token_bypasses_store() {
        let descriptor = ContextDescriptor::new("https://other.dev", "namespace")
            .with_token(Some("explicit".to_string()));
        assert!(check_context(descriptor).await.is_ok());
    }

    #[tokio::test]
    async fn test_context_validator_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let descriptor = ContextDescriptor::new("https://okteto.dev", "ns");
        let result = ContextValidator::new(descriptor, resolver())
            .validate(cancel)
            .await;
        assert!(matches!(result, Err(ValidationError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_validator_cancelled_during_lookup() {
        let lookup = FakeUrlLookup::slow(Some("https://okteto.dev"), Duration::from_secs(10));
        let resolver = Arc::new(ContextResolver::new(store(), lookup.clone()));
        let validator = ContextValidator::new(ContextDescriptor::new("my-cluster", "ns"), resolver);

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = validator.validate(cancel).await;

        assert!(matches!(result, Err(ValidationError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(lookup.calls(), 1);
    }

    async fn check_support(
        client: FakeOktetoClient,
        descriptor: ContextDescriptor,
    ) -> (Result<(), ValidationError>, Arc<FakeClientProvider>) {
        let provider = FakeClientProvider::new(client);
        let result = OktetoSupportValidator::new(descriptor, resolver(), provider.clone())
            .validate(CancellationToken::new())
            .await;
        (result, provider)
    }

    #[tokio::test]
    async fn test_support_validator() {
        let descriptor = ContextDescriptor::new("https://okteto.dev", "namespace");
        let (result, provider) = check_support(FakeOktetoClient::default(), descriptor).await;
        assert!(result.is_ok());
        assert_eq!(provider.client.check_calls(), 1);
    }

    #[tokio::test]
    async fn test_support_validator_errors() {
        let descriptor = ContextDescriptor::new("https://okteto.dev", "namespace");

        let client = FakeOktetoClient {
            check_status: Some(404),
            ..Default::default()
        };
        let (result, _) = check_support(client, descriptor.clone()).await;
        assert!(matches!(result, Err(ValidationError::ServiceUnsupported)));

        let client = FakeOktetoClient {
            check_status: Some(403),
            ..Default::default()
        };
        let (result, _) = check_support(client, descriptor.clone()).await;
        assert!(
            matches!(result, Err(ValidationError::NamespaceForbidden { ref namespace }) if namespace == "namespace")
        );

        let client = FakeOktetoClient {
            check_status: Some(500),
            ..Default::default()
        };
        let (result, _) = check_support(client, descriptor).await;
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("error checking kubetoken service: "));
    }

    #[tokio::test]
    async fn test_support_validator_empty_context() {
        let (result, provider) =
            check_support(FakeOktetoClient::default(), ContextDescriptor::new("", "ns")).await;
        assert!(matches!(result, Err(ValidationError::EmptyContext)));
        assert_eq!(provider.provided(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_wins() {
        let validator = PreReqValidator::new(vec![
            DelayedValidator::new(10, true),
            DelayedValidator::new(10_000, false),
        ])
        .with_timeout(Duration::from_secs(30));

        let start = Instant::now();
        let result = validator.validate(&CancellationToken::new()).await;

        assert!(matches!(result, Err(ValidationError::ServiceUnsupported)));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_validators_pass() {
        let validator = PreReqValidator::new(vec![
            DelayedValidator::new(10, false),
            DelayedValidator::new(50, false),
        ]);
        assert!(validator.validate(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_boundary() {
        let timeout = Duration::from_secs(1);
        let validator = PreReqValidator::new(vec![
            DelayedValidator::new(10_000, false),
            DelayedValidator::new(10_000, false),
        ])
        .with_timeout(timeout);

        let start = Instant::now();
        let result = validator.validate(&CancellationToken::new()).await;
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(ValidationError::Timeout(t)) if t == timeout));
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation() {
        let parent = CancellationToken::new();
        let canceller = parent.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let validator = PreReqValidator::new(vec![DelayedValidator::new(10_000, false)]);
        let result = validator.validate(&parent).await;
        assert!(matches!(result, Err(ValidationError::Cancelled)));

        // Already cancelled parents never start the validators
        let result = validator.validate(&parent).await;
        assert!(matches!(result, Err(ValidationError::Cancelled)));
    }

    #[tokio::test]
    async fn test_kubetoken_validators_end_to_end() {
        let descriptor = ContextDescriptor::new("https://okteto.dev", "namespace");
        let provider = FakeClientProvider::new(FakeOktetoClient::default());
        let validators = kubetoken_validators(&descriptor, resolver(), provider.clone());

        assert_eq!(validators.len(), 2);
        let result = PreReqValidator::new(validators)
            .validate(&CancellationToken::new())
            .await;
        assert!(result.is_ok());
        assert_eq!(provider.client.check_calls(), 1);
    }
}
