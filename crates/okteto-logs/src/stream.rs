use std::sync::Arc;
use std::time::Duration;

use okteto_api::{ApiError, OktetoInterface};
use okteto_types::LogEntry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backoff::{RetryError, stream_with_backoff};
use crate::parser::LogParser;

/// A remote log stream that can be followed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSource {
    /// Logs of a pipeline deploy/destroy action
    Pipeline {
        name: String,
        namespace: String,
        action: String,
    },
    /// Logs of a namespace destroy-all operation
    DestroyAll { namespace: String },
}

impl LogSource {
    pub fn description(&self) -> String {
        match self {
            Self::Pipeline {
                name, namespace, ..
            } => format!("streaming logs of pipeline '{name}' in namespace '{namespace}'"),
            Self::DestroyAll { namespace } => {
                format!("streaming destroy all logs of namespace '{namespace}'")
            }
        }
    }

    async fn follow(
        &self,
        client: &dyn OktetoInterface,
        cancel: CancellationToken,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError> {
        match self {
            Self::Pipeline {
                name,
                namespace,
                action,
            } => {
                client
                    .stream()
                    .pipeline_logs(cancel, name, namespace, action, tx)
                    .await
            }
            Self::DestroyAll { namespace } => {
                client.stream().destroy_all_logs(cancel, namespace, tx).await
            }
        }
    }
}

/// Manages remote log streams, each one retried with backoff
pub struct LogStreamManager {
    /// Cancellation token for stopping streams
    cancel: CancellationToken,

    /// Active stream task handles
    tasks: Vec<JoinHandle<Result<(), RetryError>>>,
}

impl LogStreamManager {
    /// Create a new log stream manager
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Start following a log source for at most `timeout`
    pub fn start_stream(
        &mut self,
        client: Arc<dyn OktetoInterface>,
        source: LogSource,
        timeout: Duration,
        log_tx: mpsc::UnboundedSender<LogEntry>,
    ) {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<String>();

        // Forward parsed entries until the stream task drops its sender
        tokio::spawn(async move {
            while let Some(raw) = raw_rx.recv().await {
                if log_tx.send(LogParser::parse(&raw)).is_err() {
                    break;
                }
            }
        });

        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            let description = source.description();
            stream_with_backoff(
                &cancel,
                timeout,
                |attempt_cancel| {
                    let client = Arc::clone(&client);
                    let source = source.clone();
                    let raw_tx = raw_tx.clone();
                    async move { source.follow(client.as_ref(), attempt_cancel, &raw_tx).await }
                },
                &description,
            )
            .await
        });
        self.tasks.push(task);
    }

    /// Wait for every stream to finish, returning their results in start order.
    /// A panic in a stream task is resumed on the caller.
    pub async fn wait(&mut self) -> Vec<Result<(), RetryError>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.drain(..) {
            let result = match task.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(RetryError::Cancelled),
            };
            results.push(result);
        }
        results
    }

    /// Ask all streams to stop. They finish with [`RetryError::Cancelled`].
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Check if any streams are still running
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }
}

impl Default for LogStreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogStreamManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
