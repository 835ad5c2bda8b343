//! Executor host HTTP server.
//!
//! # Responsibilities
//! - Create Axum Router with the executor and health handlers
//! - Upgrade `/executors/{name}/ws` to a WebSocket and attach it to the named
//!   executor (created on first use)
//! - Wire up middleware (tracing)
//! - Stop on the shutdown signal

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::channel::websocket;
use crate::executor::ExecutorPool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ExecutorPool>,
}

/// HTTP server hosting shard executors.
pub struct ExecutorHost {
    router: Router,
    pool: Arc<ExecutorPool>,
}

impl ExecutorHost {
    pub fn new(pool: Arc<ExecutorPool>) -> Self {
        let state = AppState {
            pool: Arc::clone(&pool),
        };
        Self {
            router: Self::build_router(state),
            pool,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/executors/{name}/ws", get(executor_socket))
            .route("/health", get(health))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    pub fn pool(&self) -> &Arc<ExecutorPool> {
        &self.pool
    }

    /// Serve until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Executor host starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Executor host received shutdown signal");
            })
            .await?;

        tracing::info!("Executor host stopped");
        Ok(())
    }
}

async fn executor_socket(
    Path(name): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Executor name required").into_response();
    }

    let executor = state.pool.resolve(&name);
    ws.on_upgrade(move |socket| async move {
        tracing::debug!(executor = %executor.name(), "WebSocket channel accepted");
        executor.serve(websocket::from_axum(socket)).await;
    })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "executors": state.pool.len(),
        "subrequests": state.pool.total_subrequests(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;

    #[tokio::test]
    async fn test_health_endpoint() {
        let pool = Arc::new(ExecutorPool::new(ExecutorConfig::default()).unwrap());
        pool.resolve("a");
        let host = ExecutorHost::new(pool);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        let server = tokio::spawn(host.run(listener, rx));

        let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["executors"], 1);

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
