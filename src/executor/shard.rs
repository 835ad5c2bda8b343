//! Shard executor: performs real outbound calls on behalf of a dispatcher.
//!
//! # Responsibilities
//! - Accept a channel and read request messages from it
//! - Run each request as its own task, streaming `headers`/`body`/`end` back
//! - Keep an abort registry per channel so `[id, "abort"]` can cancel a call
//! - Count outbound calls against this executor's own quota

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::channel::{Channel, ChannelSender};
use crate::config::ExecutorConfig;
use crate::error::{FetchError, FetchResult};
use crate::http::request::PreparedRequest;
use crate::observability::metrics;
use crate::protocol::headers::snapshot;
use crate::protocol::{Command, EventMessage, RequestDescriptor, RequestId, RequestMessage, ResponseHead};

/// In-flight cancellation controllers for one channel, keyed by correlation id.
type AbortRegistry = Arc<DashMap<RequestId, CancellationToken>>;

/// One remote execution unit with an independent outbound-call quota.
#[derive(Debug)]
pub struct ShardExecutor {
    name: String,
    client: Client,
    config: ExecutorConfig,
    /// Outbound calls attempted so far.
    subrequests: AtomicU64,
    /// Calls currently being executed.
    in_flight: AtomicU64,
}

impl ShardExecutor {
    pub fn new(name: impl Into<String>, client: Client, config: ExecutorConfig) -> Self {
        Self {
            name: name.into(),
            client,
            config,
            subrequests: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subrequests(&self) -> u64 {
        self.subrequests.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Serve one channel until the peer goes away.
    ///
    /// Every call still running when the channel closes is cancelled.
    pub async fn serve(self: Arc<Self>, channel: Channel) {
        let (events, mut requests) = channel.split();
        let aborts: AbortRegistry = Arc::new(DashMap::new());
        let connection = CancellationToken::new();

        tracing::debug!(executor = %self.name, "Channel attached");

        while let Some(frame) = requests.recv().await {
            let RequestMessage(id, command) = match serde_json::from_str::<RequestMessage>(&frame) {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(executor = %self.name, error = %e, "Ignoring malformed request frame");
                    continue;
                }
            };

            match command {
                Command::Abort(_) => {
                    if let Some((_, controller)) = aborts.remove(&id) {
                        tracing::debug!(executor = %self.name, request_id = %id, "Aborting request");
                        metrics::record_executor_abort();
                        controller.cancel();
                    }
                }
                Command::Fetch(descriptor) => {
                    let cancel = connection.child_token();
                    if descriptor.options.signal {
                        aborts.insert(id, cancel.clone());
                    }
                    let executor = Arc::clone(&self);
                    let events = events.clone();
                    let aborts = Arc::clone(&aborts);
                    tokio::spawn(async move {
                        executor.execute(id, *descriptor, cancel, events, aborts).await;
                    });
                }
            }
        }

        connection.cancel();
        tracing::debug!(executor = %self.name, "Channel detached");
    }

    async fn execute(
        &self,
        id: RequestId,
        descriptor: RequestDescriptor,
        cancel: CancellationToken,
        events: ChannelSender,
        aborts: AbortRegistry,
    ) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        metrics::executor_request_started();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Aborted),
            result = self.stream_response(id, descriptor, &events) => result,
        };
        aborts.remove(&id);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        metrics::executor_request_finished();

        match outcome {
            Ok(()) => metrics::record_executor_request("ok"),
            Err(FetchError::Aborted) => {
                tracing::debug!(executor = %self.name, request_id = %id, "Request cancelled");
                metrics::record_executor_request("aborted");
            }
            Err(FetchError::ChannelClosed) => {
                tracing::debug!(executor = %self.name, request_id = %id, "Channel closed mid-response");
                metrics::record_executor_request("orphaned");
            }
            Err(e) => {
                tracing::warn!(executor = %self.name, request_id = %id, error = %e, "Outbound call failed");
                metrics::record_executor_request("error");
                if self.config.report_errors {
                    let _ = events.send(&EventMessage::Error { id, data: e.to_string() });
                }
            }
        }
    }

    async fn stream_response(
        &self,
        id: RequestId,
        descriptor: RequestDescriptor,
        events: &ChannelSender,
    ) -> FetchResult<()> {
        self.take_quota()?;

        let request = PreparedRequest::from_descriptor(descriptor)?.build(&self.client)?;
        tracing::debug!(
            executor = %self.name,
            request_id = %id,
            method = %request.method(),
            url = %request.url(),
            "Executing request"
        );

        let mut response = self.client.execute(request).await?;
        let status = response.status();
        events.send(&EventMessage::Headers {
            id,
            data: ResponseHead {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers: snapshot(response.headers()),
            },
        })?;

        while let Some(chunk) = response.chunk().await? {
            events.send(&EventMessage::Body { id, data: chunk.to_vec() })?;
        }

        events.send(&EventMessage::End { id })?;
        Ok(())
    }

    fn take_quota(&self) -> FetchResult<()> {
        let used = self.subrequests.fetch_add(1, Ordering::SeqCst);
        match self.config.max_subrequests {
            Some(limit) if used >= limit => Err(FetchError::QuotaExceeded { limit }),
            _ => Ok(()),
        }
    }
}
