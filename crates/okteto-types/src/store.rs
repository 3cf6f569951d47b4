//! Persisted okteto context store
//!
//! The store lives in `<okteto home>/.okteto/context/config.json` and maps a
//! context name (the Okteto URL for managed clusters, the kube-context name
//! otherwise) to its saved session.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error reading okteto contexts from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("okteto context store '{path}' is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single saved context
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OktetoContext {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub global_namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kubeconfig: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub buildkit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub registry: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub certificate: String,
    pub is_okteto: bool,
}

/// Read-only snapshot of every known context
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStore {
    #[serde(default)]
    pub contexts: BTreeMap<String, OktetoContext>,

    #[serde(rename = "current-context", default)]
    pub current_context: String,
}

impl ContextStore {
    /// Load the store from disk. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| StoreError::Corrupted {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up a context by its exact name
    pub fn get(&self, name: &str) -> Option<&OktetoContext> {
        self.contexts.get(name)
    }

    /// Find the stored context whose URL maps to the given kube-context name
    /// (e.g. `okteto_com` for `https://okteto.com`)
    pub fn find_by_k8s_name(&self, k8s_context: &str) -> Option<&str> {
        self.contexts
            .keys()
            .find(|name| url_to_context(name).as_deref() == Some(k8s_context))
            .map(String::as_str)
    }

    /// The currently selected context, if any
    pub fn current(&self) -> Option<&OktetoContext> {
        if self.current_context.is_empty() {
            return None;
        }
        self.contexts.get(&self.current_context)
    }
}

/// Translate an Okteto URL to the kube-context name okteto writes into the
/// kubeconfig: the host with dots replaced by underscores.
pub fn url_to_context(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let host = url.host_str()?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Some(host.replace('.', "_"))
}
