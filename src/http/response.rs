//! Response objects handed back to callers.
//!
//! A [`Response`] looks the same whether the call ran locally or through a
//! shard: status and headers are available immediately, the body is pulled
//! chunk by chunk as it arrives.

use bytes::{Bytes, BytesMut};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchResult};
use crate::protocol::headers::to_header_map;
use crate::protocol::ResponseHead;

/// Producer side of a reconstructed body stream.
pub type BodySender = mpsc::UnboundedSender<FetchResult<Bytes>>;

enum Body {
    Direct {
        response: reqwest::Response,
        signal: Option<CancellationToken>,
    },
    Streamed(mpsc::UnboundedReceiver<FetchResult<Bytes>>),
}

/// A fetch-style response.
pub struct Response {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Wrap a response from a direct (local) call.
    pub fn direct(response: reqwest::Response, signal: Option<CancellationToken>) -> Self {
        let status = response.status();
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: response.headers().clone(),
            body: Body::Direct { response, signal },
        }
    }

    /// Build a response from a `headers` event, returning the body sink that
    /// later `body` events are pushed into.
    pub fn streamed(head: ResponseHead) -> FetchResult<(Self, BodySender)> {
        let status = StatusCode::from_u16(head.status)
            .map_err(|_| FetchError::Remote(format!("invalid status code {}", head.status)))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let response = Self {
            status,
            status_text: head.status_text,
            headers: to_header_map(&head.headers),
            body: Body::Streamed(rx),
        };
        Ok((response, tx))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Next body chunk, or `None` once the body is complete.
    pub async fn chunk(&mut self) -> FetchResult<Option<Bytes>> {
        match &mut self.body {
            Body::Direct { response, signal: Some(signal) } => tokio::select! {
                biased;
                _ = signal.cancelled() => Err(FetchError::Aborted),
                chunk = response.chunk() => Ok(chunk?),
            },
            Body::Direct { response, signal: None } => Ok(response.chunk().await?),
            Body::Streamed(rx) => rx.recv().await.transpose(),
        }
    }

    /// Collect the whole body.
    pub async fn bytes(mut self) -> FetchResult<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }

    /// Collect the body as text, replacing invalid UTF-8.
    pub async fn text(self) -> FetchResult<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn json<T: DeserializeOwned>(self) -> FetchResult<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.body {
            Body::Direct { .. } => "direct",
            Body::Streamed(_) => "shard",
        };
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("source", &source)
            .finish()
    }
}
