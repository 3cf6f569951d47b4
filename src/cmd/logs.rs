//! `okteto logs`: follow remote pipeline and destroy-all logs

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use okteto_api::OktetoClientProvider;
use okteto_k8s::OktetoUrlLookup;
use okteto_kubetoken::ContextResolver;
use okteto_logs::{LogEntry, LogLevel, LogSource, LogStreamManager, RetryError};
use okteto_types::ContextStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const DEFAULT_STREAM_TIMEOUT: &str = "300";

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Okteto context URL or kube-context name, defaults to the current context
    #[arg(short, long, global = true, env = "OKTETO_CONTEXT")]
    pub context: Option<String>,

    /// How long to keep following the logs, in seconds
    #[arg(long, global = true, default_value = DEFAULT_STREAM_TIMEOUT)]
    pub timeout: u64,

    #[command(subcommand)]
    pub target: LogsTarget,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LogsTarget {
    /// Logs of a pipeline deploy or destroy
    Pipeline {
        /// Pipeline name
        #[arg(long)]
        name: String,

        #[arg(short, long, env = "OKTETO_NAMESPACE")]
        namespace: String,

        /// Action to follow
        #[arg(long, default_value = "")]
        action: String,
    },
    /// Logs of a namespace destroy-all
    DestroyAll {
        #[arg(short, long, env = "OKTETO_NAMESPACE")]
        namespace: String,
    },
}

impl From<LogsTarget> for LogSource {
    fn from(target: LogsTarget) -> Self {
        match target {
            LogsTarget::Pipeline {
                name,
                namespace,
                action,
            } => LogSource::Pipeline {
                name,
                namespace,
                action,
            },
            LogsTarget::DestroyAll { namespace } => LogSource::DestroyAll { namespace },
        }
    }
}

pub struct LogsCmd {
    store: Arc<ContextStore>,
    lookup: Arc<dyn OktetoUrlLookup>,
    provider: Arc<dyn OktetoClientProvider>,
}

impl LogsCmd {
    pub fn new(
        store: Arc<ContextStore>,
        lookup: Arc<dyn OktetoUrlLookup>,
        provider: Arc<dyn OktetoClientProvider>,
    ) -> Self {
        Self {
            store,
            lookup,
            provider,
        }
    }

    /// Stream logs to `out` until the remote operation finishes, the timeout
    /// elapses or `cancel` fires
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        args: LogsArgs,
        fallback_url: Option<String>,
        token: Option<String>,
        out: &mut impl Write,
    ) -> Result<()> {
        let context = args
            .context
            .or(fallback_url)
            .unwrap_or_else(|| self.store.current_context.clone());

        let resolver = ContextResolver::new(Arc::clone(&self.store), Arc::clone(&self.lookup));
        let identifier = resolver
            .resolve(&context)
            .await
            .context("no okteto context selected, run 'okteto context' first")?;

        let token = token
            .or_else(|| self.store.get(&identifier).map(|ctx| ctx.token.clone()))
            .unwrap_or_default();
        let client = self
            .provider
            .provide(&identifier, &token)
            .with_context(|| format!("error creating okteto client for '{identifier}'"))?;

        let source = LogSource::from(args.target);
        let description = source.description();
        let timeout = Duration::from_secs(args.timeout);

        let (log_tx, mut log_rx) = mpsc::unbounded_channel();
        let mut manager = LogStreamManager::new();
        manager.start_stream(client, source, timeout, log_tx);

        let mut stopping = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled(), if !stopping => {
                    manager.stop();
                    stopping = true;
                }
                entry = log_rx.recv() => match entry {
                    Some(entry) => writeln!(out, "{}", format_entry(&entry))?,
                    None => break,
                },
            }
        }
        out.flush()?;

        for result in manager.wait().await {
            match result {
                Ok(()) | Err(RetryError::Cancelled) => {}
                Err(RetryError::DeadlineExceeded) => {
                    tracing::warn!(
                        "{description}: stopped after {timeout:?}, the final output will be available once the operation completes"
                    );
                }
            }
        }
        Ok(())
    }
}

/// One terminal line per entry: `[stage] LVL message`
fn format_entry(entry: &LogEntry) -> String {
    let mut line = String::new();
    if let Some(stage) = &entry.stage {
        line.push_str(&format!("[{stage}] "));
    }
    if matches!(entry.level, LogLevel::Warn | LogLevel::Error) {
        line.push_str(entry.level.as_str());
        line.push(' ');
    }
    line.push_str(&entry.message);
    line
}
