//! Dynamic kubernetes tokens for okteto contexts
//!
//! Before a token is requested the context is resolved and a set of
//! pre-flight validators runs concurrently under a shared timeout. The issued
//! token is written in the client-go exec credential format.

mod credential;
mod error;
mod resolve;
mod validator;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use credential::{issue_token, serialize_exec_credential};
pub use error::ValidationError;
pub use resolve::{ContextResolver, is_url};
pub use validator::{
    ContextValidator, DEFAULT_VALIDATION_TIMEOUT, OktetoSupportValidator, PreReqValidator,
    Validator, kubetoken_validators,
};
