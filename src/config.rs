//! Settings read from the environment
//!
//! okteto keeps its state under `<home>/.okteto`. The home directory is the
//! user's unless `OKTETO_HOME` points somewhere else.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use okteto_kubetoken::DEFAULT_VALIDATION_TIMEOUT;
use okteto_types::ContextStore;

const OKTETO_FOLDER: &str = ".okteto";

/// Process-wide settings, resolved once at start-up
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub home: PathBuf,

    /// `OKTETO_URL`, used when no context is selected
    pub url: Option<String>,

    /// `OKTETO_TOKEN`, overrides the token saved for the context
    pub token: Option<String>,

    pub validation_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let home = match var("OKTETO_HOME") {
            Some(home) => PathBuf::from(home),
            None => dirs::home_dir()
                .context("could not determine the home directory, please set OKTETO_HOME")?,
        };

        let validation_timeout = match var("OKTETO_KUBETOKEN_TIMEOUT") {
            Some(secs) => Duration::from_secs(
                secs.trim()
                    .parse()
                    .with_context(|| format!("invalid OKTETO_KUBETOKEN_TIMEOUT '{secs}'"))?,
            ),
            None => DEFAULT_VALIDATION_TIMEOUT,
        };

        Ok(Self {
            home,
            url: var("OKTETO_URL"),
            token: var("OKTETO_TOKEN"),
            validation_timeout,
        })
    }

    /// `<home>/.okteto/context/config.json`
    pub fn context_store_path(&self) -> PathBuf {
        self.home
            .join(OKTETO_FOLDER)
            .join("context")
            .join("config.json")
    }

    /// Load the saved contexts. A missing store is empty.
    pub fn load_store(&self) -> Result<ContextStore> {
        Ok(ContextStore::load(&self.context_store_path())?)
    }
}
