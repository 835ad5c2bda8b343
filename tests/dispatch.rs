//! End-to-end dispatch through in-process shard executors.

mod common;

use std::time::Duration;

use reqwest::Method;
use unbound_fetch::config::ExecutorConfig;
use unbound_fetch::{CancellationToken, FetchError, RequestInit};

use common::{dispatch_config, eventually, expected_chunked, local_dispatcher, start_mock_backend};

#[tokio::test]
async fn test_first_threshold_calls_run_locally() {
    let addr = start_mock_backend().await;
    let (fetch, pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(3, 100));
    let url = format!("http://{}/echo", addr);

    for _ in 0..3 {
        let response = fetch.fetch(&url, RequestInit::new()).await.unwrap();
        assert!(response.ok());
        response.bytes().await.unwrap();
    }
    assert_eq!(fetch.registry().channels_opened(), 0);
    assert_eq!(pool.total_subrequests(), 0);

    let response = fetch.fetch(&url, RequestInit::new()).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "GET|-|");
    assert_eq!(fetch.registry().channels_opened(), 1);
    assert_eq!(pool.total_subrequests(), 1);
    assert_eq!(fetch.calls(), 4);
    assert_eq!(fetch.remote_calls(), 1);
}

#[tokio::test]
async fn test_shard_rotation() {
    let addr = start_mock_backend().await;
    let (fetch, pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 2));
    let url = format!("http://{}/echo", addr);

    for _ in 0..3 {
        let response = fetch.fetch(&url, RequestInit::new()).await.unwrap();
        response.bytes().await.unwrap();
    }

    assert_eq!(fetch.registry().channels_opened(), 2);
    assert_eq!(fetch.open_channels(), 2);
    assert_eq!(pool.get(&fetch.executor_name(0)).unwrap().subrequests(), 2);
    assert_eq!(pool.get(&fetch.executor_name(1)).unwrap().subrequests(), 1);
    assert!(pool.get(&fetch.executor_name(2)).is_none());
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_channel() {
    let addr = start_mock_backend().await;
    let (fetch, pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));
    let url = format!("http://{}/echo", addr);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let fetch = fetch.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            fetch.fetch(&url, RequestInit::new()).await?.text().await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "GET|-|");
    }

    assert_eq!(fetch.registry().channels_opened(), 1);
    assert_eq!(pool.total_subrequests(), 20);
}

#[tokio::test]
async fn test_remote_body_matches_direct_fetch() {
    let addr = start_mock_backend().await;
    let (fetch, _pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));
    let url = format!("http://{}/chunked/5", addr);

    let direct = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
    let response = fetch.fetch(&url, RequestInit::new()).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.status_text(), "OK");
    let remote = response.bytes().await.unwrap();

    assert_eq!(remote, direct);
    assert_eq!(remote, expected_chunked(5).as_bytes());
}

#[tokio::test]
async fn test_method_headers_and_body_are_forwarded() {
    let addr = start_mock_backend().await;
    let (fetch, _pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));

    let init = RequestInit::new()
        .method(Method::POST)
        .header("X-Test", "forwarded")
        .body("payload");
    let response = fetch
        .fetch(format!("http://{}/echo", addr), init)
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "POST|forwarded|payload");
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let addr = start_mock_backend().await;
    let (fetch, _pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));

    let response = fetch
        .fetch(format!("http://{}/status/404", addr), RequestInit::new())
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert!(!response.ok());
}

#[tokio::test]
async fn test_interleaved_streams_stay_separate() {
    let addr = start_mock_backend().await;
    let (fetch, _pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));

    let a = fetch.fetch(format!("http://{}/chunked/5", addr), RequestInit::new());
    let b = fetch.fetch(format!("http://{}/chunked/3", addr), RequestInit::new());
    let (a, b) = tokio::join!(a, b);
    let (a, b) = tokio::join!(a.unwrap().text(), b.unwrap().text());

    assert_eq!(a.unwrap(), expected_chunked(5));
    assert_eq!(b.unwrap(), expected_chunked(3));
    assert_eq!(fetch.open_channels(), 1);
}

#[tokio::test]
async fn test_cancel_mid_body() {
    let addr = start_mock_backend().await;
    let (fetch, pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));
    let signal = CancellationToken::new();

    let mut response = fetch
        .fetch(
            format!("http://{}/chunked/50", addr),
            RequestInit::new().signal(signal.clone()),
        )
        .await
        .unwrap();
    assert!(response.chunk().await.unwrap().is_some());

    signal.cancel();
    let err = loop {
        match response.chunk().await {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("body finished despite cancellation"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, FetchError::Aborted));

    let executor = pool.get(&fetch.executor_name(0)).unwrap();
    assert!(eventually(|| executor.in_flight() == 0).await);
}

#[tokio::test]
async fn test_cancel_before_headers() {
    let addr = start_mock_backend().await;
    let (fetch, pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(0, 100));
    let signal = CancellationToken::new();

    let canceller = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = fetch
        .fetch(
            format!("http://{}/slow", addr),
            RequestInit::new().signal(signal),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Aborted));

    let executor = pool.get(&fetch.executor_name(0)).unwrap();
    assert!(eventually(|| executor.in_flight() == 0).await);
}

#[tokio::test]
async fn test_local_call_cancellation() {
    let addr = start_mock_backend().await;
    let (fetch, _pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(1, 100));
    let signal = CancellationToken::new();

    let canceller = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = fetch
        .fetch(
            format!("http://{}/slow", addr),
            RequestInit::new().signal(signal),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Aborted));
    assert_eq!(fetch.registry().channels_opened(), 0);
}

#[tokio::test]
async fn test_executor_quota_reported_as_remote_error() {
    let addr = start_mock_backend().await;
    let executor = ExecutorConfig {
        max_subrequests: Some(1),
        ..ExecutorConfig::default()
    };
    let (fetch, _pool) = local_dispatcher(executor, dispatch_config(0, 2));
    let url = format!("http://{}/echo", addr);

    fetch.fetch(&url, RequestInit::new()).await.unwrap();
    let err = fetch.fetch(&url, RequestInit::new()).await.unwrap_err();
    match err {
        FetchError::Remote(message) => assert!(message.contains("quota")),
        other => panic!("unexpected error: {other}"),
    }

    // Next shard has a fresh quota.
    fetch.fetch(&url, RequestInit::new()).await.unwrap();
}

#[tokio::test]
async fn test_deadline_aborts_executor_call() {
    let addr = start_mock_backend().await;
    let mut dispatch = dispatch_config(0, 100);
    dispatch.response_timeout_secs = Some(1);
    let (fetch, pool) = local_dispatcher(ExecutorConfig::default(), dispatch);

    // No caller signal: the deadline alone has to stop the executor.
    let err = fetch
        .fetch(format!("http://{}/slow", addr), RequestInit::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));

    let executor = pool.get(&fetch.executor_name(0)).unwrap();
    assert!(eventually(|| executor.in_flight() == 0).await);
}

#[tokio::test]
async fn test_silent_executor_failure_hits_deadline() {
    let executor = ExecutorConfig {
        report_errors: false,
        ..ExecutorConfig::default()
    };
    let mut dispatch = dispatch_config(0, 100);
    dispatch.response_timeout_secs = Some(1);
    let (fetch, _pool) = local_dispatcher(executor, dispatch);

    // Nothing listens on port 9 locally.
    let err = fetch
        .fetch("http://127.0.0.1:9/", RequestInit::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));
}

#[tokio::test]
async fn test_clones_share_state() {
    let addr = start_mock_backend().await;
    let (fetch, _pool) = local_dispatcher(ExecutorConfig::default(), dispatch_config(1, 100));
    let other = fetch.clone();
    let url = format!("http://{}/echo", addr);

    fetch.fetch(&url, RequestInit::new()).await.unwrap();
    other.fetch(&url, RequestInit::new()).await.unwrap();

    assert_eq!(fetch.calls(), 2);
    assert_eq!(other.session_id(), fetch.session_id());
    assert_eq!(other.remote_calls(), 1);
}
