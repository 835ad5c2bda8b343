//! unbound-fetch executor host.
//!
//! Hosts shard executors behind a WebSocket endpoint so dispatchers in
//! quota-capped environments can route calls through them.
//!
//! ```text
//!   dispatcher ──ws──▶ /executors/{session}-{name}-0/ws ──▶ ShardExecutor ──▶ origin
//!              ──ws──▶ /executors/{session}-{name}-1/ws ──▶ ShardExecutor ──▶ origin
//!              ...
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use unbound_fetch::config::load_or_default;
use unbound_fetch::lifecycle::{signals, Shutdown};
use unbound_fetch::observability::{logging, metrics};
use unbound_fetch::{ExecutorHost, ExecutorPool};

#[derive(Parser)]
#[command(name = "unbound-fetch")]
#[command(about = "Host shard executors for unbound-fetch dispatchers", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("unbound-fetch v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_subrequests = ?config.executor.max_subrequests,
        report_errors = config.executor.report_errors,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = Arc::new(ExecutorPool::new(config.executor.clone())?);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    ExecutorHost::new(pool)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
