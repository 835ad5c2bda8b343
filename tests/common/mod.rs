//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Path;
use axum::http::{HeaderMap, Method};
use axum::routing::{any, get};
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;

use unbound_fetch::config::ExecutorConfig;
use unbound_fetch::{DispatchConfig, ExecutorPool, LocalRegistry, UnboundFetch};

/// Start a mock origin on an ephemeral port.
///
/// Routes:
/// - `/echo`: replies with `METHOD|x-test header|body`
/// - `/chunked/{n}`: streams `n` chunks of `chunk-{i};` with a short gap between each
/// - `/slow`: answers after two seconds
/// - `/status/{code}`: empty reply with the given status
pub async fn start_mock_backend() -> SocketAddr {
    let app = Router::new()
        .route("/echo", any(echo))
        .route("/chunked/{n}", get(chunked))
        .route("/slow", get(slow))
        .route("/status/{code}", get(status));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> String {
    let tag = headers
        .get("x-test")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    format!("{}|{}|{}", method, tag, String::from_utf8_lossy(&body))
}

async fn chunked(Path(n): Path<usize>) -> Body {
    let stream = futures_util::stream::unfold(0usize, move |i| async move {
        if i >= n {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        Some((Ok::<_, Infallible>(Bytes::from(format!("chunk-{};", i))), i + 1))
    });
    Body::from_stream(stream)
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "slow"
}

async fn status(Path(code): Path<u16>) -> axum::http::StatusCode {
    axum::http::StatusCode::from_u16(code).unwrap_or(axum::http::StatusCode::BAD_REQUEST)
}

pub fn expected_chunked(n: usize) -> String {
    (0..n).map(|i| format!("chunk-{};", i)).collect()
}

pub fn dispatch_config(threshold: u64, shard_limit: u64) -> DispatchConfig {
    DispatchConfig {
        threshold,
        shard_limit,
        ..DispatchConfig::default()
    }
}

/// Dispatcher wired to in-process executors sharing `pool`.
pub fn local_dispatcher(
    executor: ExecutorConfig,
    dispatch: DispatchConfig,
) -> (UnboundFetch<LocalRegistry>, Arc<ExecutorPool>) {
    let pool = Arc::new(ExecutorPool::new(executor).unwrap());
    let fetch = UnboundFetch::new(LocalRegistry::new(Arc::clone(&pool)), dispatch).unwrap();
    (fetch, pool)
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
