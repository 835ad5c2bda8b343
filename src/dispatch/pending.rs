//! Response reconstruction from channel events.
//!
//! # Responsibilities
//! - Track calls waiting for `headers` (pending request table)
//! - Track bodies being fed by `body` events (pending stream table)
//! - Resolve callers as soon as `headers` arrives; close bodies on `end`
//! - Fail whatever is still pending when a call is aborted or the channel dies

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult};
use crate::http::response::{BodySender, Response};
use crate::protocol::{EventMessage, RequestId};

/// Resolution side of a dispatched call.
pub type ResponseSender = oneshot::Sender<FetchResult<Response>>;

struct PendingRequest {
    /// Taken when `headers` resolves the caller.
    respond: Option<ResponseSender>,
    /// Cancelled once the call is finished, releasing its abort watcher.
    done: CancellationToken,
}

/// Pending request and stream tables for one channel.
#[derive(Default)]
pub struct PendingTable {
    requests: DashMap<RequestId, PendingRequest>,
    streams: DashMap<RequestId, BodySender>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call before its request frame is sent.
    pub fn register(&self, id: RequestId, respond: ResponseSender, done: CancellationToken) {
        self.requests.insert(
            id,
            PendingRequest {
                respond: Some(respond),
                done,
            },
        );
    }

    /// Number of calls not yet ended.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Apply one event from the executor. Events for unknown ids are ignored.
    pub fn apply(&self, event: EventMessage) {
        match event {
            EventMessage::Headers { id, data } => {
                // The stream must exist before the request entry is released,
                // so a concurrent `fail` always sees one or the other.
                let (respond, outcome) = {
                    let Some(mut entry) = self.requests.get_mut(&id) else {
                        tracing::trace!(request_id = %id, "Headers for unknown request ignored");
                        return;
                    };
                    let Some(respond) = entry.respond.take() else {
                        tracing::warn!(request_id = %id, "Duplicate headers event ignored");
                        return;
                    };
                    let outcome = Response::streamed(data).map(|(response, body)| {
                        self.streams.insert(id, body);
                        response
                    });
                    (respond, outcome)
                };

                if respond.send(outcome).is_err() {
                    // Caller went away; later body events are dropped.
                    self.streams.remove(&id);
                }
            }
            EventMessage::Body { id, data } => {
                if let Some(body) = self.streams.get(&id) {
                    let _ = body.send(Ok(Bytes::from(data)));
                }
            }
            EventMessage::End { id } => {
                self.streams.remove(&id);
                if let Some((_, request)) = self.requests.remove(&id) {
                    if let Some(respond) = request.respond {
                        // `end` without `headers`; never produced by an executor.
                        let _ = respond.send(Err(FetchError::Remote(
                            "response ended before headers".to_string(),
                        )));
                    }
                    request.done.cancel();
                }
            }
            EventMessage::Error { id, data } => {
                self.fail(id, || FetchError::Remote(data.clone()));
            }
        }
    }

    /// Fail one call, wherever it is in its lifecycle, and forget it.
    pub fn fail(&self, id: RequestId, error: impl Fn() -> FetchError) -> bool {
        let stream = self.streams.remove(&id);
        let request = self.requests.remove(&id);
        let found = stream.is_some() || request.is_some();

        if let Some((_, body)) = stream {
            let _ = body.send(Err(error()));
        }
        if let Some((_, request)) = request {
            if let Some(respond) = request.respond {
                let _ = respond.send(Err(error()));
            }
            request.done.cancel();
        }
        found
    }

    /// Fail every call on this table, used when the channel is lost.
    pub fn fail_all(&self, error: impl Fn() -> FetchError) {
        let mut ids: Vec<RequestId> = self.requests.iter().map(|e| *e.key()).collect();
        ids.extend(self.streams.iter().map(|e| *e.key()));
        for id in ids {
            self.fail(id, &error);
        }
    }
}
