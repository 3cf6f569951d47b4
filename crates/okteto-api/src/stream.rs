use std::fmt::Display;

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::StreamClient;
use crate::client::{OktetoClient, endpoint, error_for_status};
use crate::error::ApiError;

/// Event name the server sends once the stream is complete
const DONE_EVENT: &str = "done";

impl OktetoClient {
    /// Follow an SSE endpoint, forwarding event payloads until the server
    /// sends `done`
    async fn follow(
        &self,
        cancel: CancellationToken,
        url: Url,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError> {
        tracing::debug!(%url, "connecting to log stream");

        let response = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            response = self.get(url).header(ACCEPT, "text/event-stream").send() => response?,
        };
        let response = error_for_status(response).await?;

        forward_events(&cancel, response.bytes_stream(), tx).await
    }
}

/// Decode `body` as server-sent events and send each payload to `tx`
async fn forward_events<S, B, E>(
    cancel: &CancellationToken,
    body: S,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<(), ApiError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ApiError> + Display,
{
    let mut events = std::pin::pin!(body.eventsource());

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(ApiError::Cancelled),

            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        if event.event == DONE_EVENT {
                            return Ok(());
                        }
                        if tx.send(event.data).is_err() {
                            // Nobody is reading anymore
                            return Ok(());
                        }
                    }
                    Some(Err(EventStreamError::Transport(e))) => return Err(e.into()),
                    Some(Err(e)) => return Err(ApiError::InvalidEvent(e.to_string())),
                    None => return Err(ApiError::StreamInterrupted),
                }
            }
        }
    }
}

#[async_trait]
impl StreamClient for OktetoClient {
    async fn pipeline_logs(
        &self,
        cancel: CancellationToken,
        name: &str,
        namespace: &str,
        action: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError> {
        let mut url = endpoint(&self.base_url, &["sse", "logs", namespace, "gitdeploy", name])?;
        if !action.is_empty() {
            url.query_pairs_mut().append_pair("action", action);
        }
        self.follow(cancel, url, tx).await
    }

    async fn destroy_all_logs(
        &self,
        cancel: CancellationToken,
        namespace: &str,
        tx: &mpsc::UnboundedSender<String>,
    ) -> Result<(), ApiError> {
        let url = endpoint(&self.base_url, &["sse", "logs", namespace, "destroy-all"])?;
        self.follow(cancel, url, tx).await
    }
}
