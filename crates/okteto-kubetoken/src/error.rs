use std::time::Duration;

use okteto_api::ApiError;
use thiserror::Error;

/// Reasons a dynamic kubernetes token cannot be requested
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid context: context name cannot be empty")]
    EmptyContext,

    #[error("namespace cannot be empty")]
    EmptyNamespace,

    #[error("invalid context: context '{identifier}' not found in the okteto context store")]
    ContextNotFound { identifier: String },

    #[error("invalid context: context '{identifier}' is not an okteto context")]
    NotManagedContext { identifier: String },

    #[error("you don't have access to the namespace '{namespace}'")]
    NamespaceForbidden { namespace: String },

    #[error("the okteto instance doesn't support dynamic kubernetes tokens")]
    ServiceUnsupported,

    /// The remote error is part of the message, not a separate source
    #[error("{action}: {cause}")]
    RemoteCallFailed {
        action: &'static str,
        cause: ApiError,
    },

    #[error("validation cancelled")]
    Cancelled,

    #[error("validation timed out after {0:?}")]
    Timeout(Duration),
}

impl ValidationError {
    /// Classify an error returned by the kubetoken service
    pub(crate) fn from_service(err: ApiError, action: &'static str, namespace: &str) -> Self {
        match err {
            ApiError::NotFound(_) => Self::ServiceUnsupported,
            ApiError::Forbidden(_) => Self::NamespaceForbidden {
                namespace: namespace.to_string(),
            },
            ApiError::Cancelled => Self::Cancelled,
            cause => Self::RemoteCallFailed { action, cause },
        }
    }

    /// Whether the validation was interrupted rather than failing on its own
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }
}
