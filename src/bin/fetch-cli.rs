use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use reqwest::Method;

use unbound_fetch::config::load_or_default;
use unbound_fetch::observability::logging;
use unbound_fetch::{RequestInit, UnboundFetch, WebSocketRegistry};

#[derive(Parser)]
#[command(name = "fetch-cli")]
#[command(about = "Issue requests through unbound-fetch shard executors", long_about = None)]
struct Cli {
    /// Target URL.
    url: String,

    /// Executor host root URL.
    #[arg(long, default_value = "http://localhost:8787")]
    host: String,

    /// Number of requests to issue.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u64,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra header, `name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Calls to run locally before routing through shards.
    #[arg(long)]
    threshold: Option<u64>,

    /// Calls per shard.
    #[arg(long)]
    shard_limit: Option<u64>,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print each response body.
    #[arg(long)]
    print_body: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    logging::init_logging(&config.observability)?;
    if let Some(threshold) = cli.threshold {
        config.dispatch.threshold = threshold;
    }
    if let Some(shard_limit) = cli.shard_limit {
        config.dispatch.shard_limit = shard_limit;
    }

    let method = Method::from_bytes(cli.method.to_uppercase().as_bytes())?;
    let mut headers = Vec::new();
    for raw in &cli.headers {
        let Some((name, value)) = raw.split_once(':') else {
            return Err(format!("header '{}' is not 'name: value'", raw).into());
        };
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let fetch = UnboundFetch::new(WebSocketRegistry::new(&cli.host)?, config.dispatch)?;
    let started = Instant::now();
    let mut failures = 0u64;

    for i in 0..cli.count {
        let init = RequestInit::new()
            .method(method.clone())
            .headers(headers.clone());
        match fetch.fetch(&cli.url, init).await {
            Ok(response) => {
                let status = response.status();
                let body = response.bytes().await?;
                println!("#{:<5} {} {} bytes", i, status, body.len());
                if cli.print_body {
                    println!("{}", String::from_utf8_lossy(&body));
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("#{:<5} error: {}", i, e);
            }
        }
    }

    println!(
        "{} requests, {} failed, {} shard channels, {:.2?}",
        cli.count,
        failures,
        fetch.open_channels(),
        started.elapsed()
    );
    Ok(())
}
