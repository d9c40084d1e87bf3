//! SoloKV demo
//!
//! Starts a server, drives it from several concurrent clients and prints
//! what the store and the server saw. Ctrl+C stops the run early.

use anyhow::Context;
use solokv::{Client, Server, ServerConfig, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Demo configuration
struct Config {
    /// Concurrent clients
    clients: usize,
    /// Operations per client
    ops: usize,
    /// Store-wide default TTL in seconds
    default_ttl: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: 4,
            ops: 10_000,
            default_ttl: None,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--clients" | "-c" => {
                    config.clients = parse_value(&args, i, "--clients");
                    i += 2;
                }
                "--ops" | "-n" => {
                    config.ops = parse_value(&args, i, "--ops");
                    i += 2;
                }
                "--default-ttl" => {
                    let secs: u64 = parse_value(&args, i, "--default-ttl");
                    if secs == 0 {
                        eprintln!("Error: --default-ttl must be greater than zero");
                        std::process::exit(1);
                    }
                    config.default_ttl = Some(secs);
                    i += 2;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("SoloKV version {}", solokv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig::default().with_default_ttl(self.default_ttl.map(Duration::from_secs))
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    match args.get(i + 1).map(|raw| raw.parse()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            eprintln!("Error: invalid value for {}", flag);
            std::process::exit(1);
        }
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
SoloKV - A Single-Owner In-Process Key-Value Store

USAGE:
    solokv [OPTIONS]

OPTIONS:
    -c, --clients <N>          Concurrent clients (default: 4)
    -n, --ops <N>              Operations per client (default: 10000)
        --default-ttl <SECS>   TTL for keys written without one
    -v, --version              Print version information
    -h, --help                 Print this help message

EXAMPLES:
    solokv                              # 4 clients x 10000 ops
    solokv --clients 16 --ops 1000      # more contention, shorter run
    RUST_LOG=solokv=debug solokv        # watch connections and expiry cycles
"#
    );
}

/// One client's share of the workload: counters, short-lived keys and reads.
fn run_worker(server: Arc<Server>, worker: usize, ops: usize) -> Result<usize, solokv::ClientError> {
    let mut client = Client::connect(&server)?;
    let counter = format!("counter:{}", worker % 2);
    let mut done = 0;

    for n in 0..ops {
        let key = format!("worker:{}:{}", worker, n % 64);
        match n % 4 {
            0 => {
                client.set(&key, Value::from(n as i64), Some(Duration::from_millis(200)))?;
            }
            1 => {
                client.incr(&counter, 1, None)?;
            }
            2 => {
                client.get(&key)?;
            }
            _ => {
                client.expire(&key, Duration::from_millis(50), false, true)?;
            }
        }
        done += 1;
    }

    Ok(done)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("solokv=info")),
        )
        .with_target(false)
        .init();

    let server = Server::new(config.server_config()).context("failed to create server")?;
    server.start().context("failed to start server")?;
    info!(clients = config.clients, ops = config.ops, "running workload");

    let started = Instant::now();
    let mut workers = JoinSet::new();
    for worker in 0..config.clients {
        let server = Arc::clone(&server);
        let ops = config.ops;
        workers.spawn_blocking(move || run_worker(server, worker, ops));
    }

    let mut total_ops = 0;
    let interrupted = tokio::select! {
        _ = async {
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Ok(done)) => total_ops += done,
                    Ok(Err(e)) => error!("worker failed: {}", e),
                    Err(e) => error!("worker panicked: {}", e),
                }
            }
        } => false,
        result = signal::ctrl_c() => {
            result.context("failed to install Ctrl+C handler")?;
            info!("Shutdown signal received, stopping server...");
            true
        }
    };
    let elapsed = started.elapsed();

    let mut observer = Client::connect(&server).context("failed to open stats connection")?;
    let store_stats = observer.stats().ok();
    drop(observer);

    server.stop();
    let joiner = Arc::clone(&server);
    tokio::task::spawn_blocking(move || joiner.join())
        .await
        .context("owner thread join task failed")??;

    if let Some(store) = store_stats {
        println!(
            "keys={} expiring={} hits={} misses={} sets={} expired={}",
            store.keys, store.expiring, store.hits, store.misses, store.sets, store.expired
        );
    }
    let server_stats = server.stats();
    println!(
        "ops={} in {:.2?} ({:.0} ops/s), requests={} errors={}{}",
        total_ops,
        elapsed,
        total_ops as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        server_stats.requests_handled.load(Ordering::Relaxed),
        server_stats.error_replies.load(Ordering::Relaxed),
        if interrupted { " (interrupted)" } else { "" }
    );

    info!("Server shutdown complete");
    Ok(())
}
