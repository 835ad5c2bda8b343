//! Caller-facing request options and outbound request construction.
//!
//! # Responsibilities
//! - Hold fetch-style options (method, headers, body, cancellation token)
//! - Validate target and options before any network activity
//! - Build the `reqwest` request used by both the local path and executors

use bytes::Bytes;
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::protocol::headers::{to_header_map, HeaderList, HeadersInit};
use crate::protocol::{RequestDescriptor, RequestOptions};

/// Options for one call, modelled on a fetch `RequestInit`.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: HeadersInit,
    pub body: Option<Bytes>,
    pub signal: Option<CancellationToken>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = headers.into();
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// A call whose target and options have passed validation.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
}

impl PreparedRequest {
    /// Validate `target` and `init`. Nothing touches the network here.
    pub fn new(target: &str, init: &RequestInit) -> FetchResult<Self> {
        let headers = init.headers.normalize()?;
        let url = parse_url(target)?;
        Ok(Self {
            url,
            method: init.method.clone().unwrap_or(Method::GET),
            headers,
            body: init.body.clone(),
        })
    }

    /// Rebuild from a descriptor received over a channel.
    pub fn from_descriptor(descriptor: RequestDescriptor) -> FetchResult<Self> {
        let url = parse_url(&descriptor.target)?;
        let method = Method::from_bytes(descriptor.options.method.as_bytes())
            .map_err(|_| FetchError::InvalidMethod(descriptor.options.method.clone()))?;
        Ok(Self {
            url,
            method,
            headers: descriptor.options.headers,
            body: descriptor.options.body.map(Bytes::from),
        })
    }

    /// Wire form of this call.
    pub fn to_descriptor(&self, signal: bool) -> RequestDescriptor {
        RequestDescriptor {
            target: self.url.to_string(),
            options: RequestOptions {
                method: self.method.to_string(),
                headers: self.headers.clone(),
                body: self.body.as_ref().map(|b| b.to_vec()),
                signal,
            },
        }
    }

    /// Build the outbound `reqwest` request.
    pub fn build(self, client: &Client) -> FetchResult<reqwest::Request> {
        let mut builder = client
            .request(self.method, self.url)
            .headers(to_header_map(&self.headers));
        if let Some(body) = self.body {
            builder = builder.body(body);
        }
        Ok(builder.build()?)
    }
}

fn parse_url(target: &str) -> FetchResult<Url> {
    Url::parse(target).map_err(|e| FetchError::InvalidUrl {
        url: target.to_string(),
        reason: e.to_string(),
    })
}
