//! Shared types for the okteto CLI
//!
//! This crate contains data structures used across multiple okteto crates:
//! the persisted context store, kubetoken payloads and remote log entries.

mod credential;
mod store;

pub use credential::{
    EXEC_CREDENTIAL_API_VERSION, EXEC_CREDENTIAL_KIND, ExecCluster, ExecCredential,
    ExecCredentialSpec, KubeTokenResponse, TokenStatus,
};
pub use store::{ContextStore, OktetoContext, StoreError, url_to_context};

use chrono::{DateTime, Utc};

// ============================================================================
// Context Descriptor
// ============================================================================

/// Per-invocation description of the context a command targets.
///
/// `identifier` starts as whatever the user typed (a URL or a kube-context
/// name) and is rewritten in place to the canonical URL once resolved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextDescriptor {
    pub identifier: String,
    pub namespace: String,
    pub token: Option<String>,
}

impl ContextDescriptor {
    pub fn new(identifier: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            namespace: namespace.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Whether an explicit token was supplied for this invocation
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Log severity level reported by remote deploy/destroy streams
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Unknown,
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" | "dbg" => Self::Debug,
            "info" | "information" => Self::Info,
            "warn" | "warning" => Self::Warn,
            "error" | "err" | "fatal" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

impl LogLevel {
    /// Short display string (3 chars)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DBG",
            Self::Info => "INF",
            Self::Warn => "WRN",
            Self::Error => "ERR",
            Self::Unknown => "???",
        }
    }
}

/// A single line of a remote pipeline or destroy-all log stream
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// Original event payload
    pub raw: String,

    /// Human readable message
    pub message: String,

    /// Detected log level
    pub level: LogLevel,

    /// Pipeline stage that produced the line (if reported)
    pub stage: Option<String>,

    /// Timestamp reported by the server (if available)
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Create a plain entry whose message is the raw payload
    pub fn new(raw: String) -> Self {
        Self {
            message: raw.clone(),
            raw,
            level: LogLevel::Info,
            stage: None,
            timestamp: None,
        }
    }
}
