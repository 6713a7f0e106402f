//! tcp-primer: basic TCP networking programs
//!
//! Three independent subcommands:
//! - `http-get`: send a GET request and print the raw response
//! - `chat`: send `<name> says: <line>` messages typed on stdin
//! - `echo-server`: accept connections and print what each one sends
//!
//! Configuration via CLI arguments or TOML file. Program output and fatal
//! errors go to stdout; tracing diagnostics go to stderr.

mod clients;
mod config;
mod server;

use config::{Config, Mode};
use server::{Server, StdoutSink};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        println!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    info!(
        mode = config.mode_name(),
        workers = ?config.workers,
        "Starting tcp-primer"
    );

    match config.mode {
        Mode::HttpGet(ref http) => {
            let runtime = current_thread_runtime()?;
            runtime.block_on(clients::http_get::run(http))?;
        }
        Mode::Chat(ref chat) => {
            let runtime = current_thread_runtime()?;
            runtime.block_on(clients::chat::run(chat))?;
        }
        Mode::EchoServer(ref echo) => {
            let runtime = server_runtime(config.workers)?;
            runtime.block_on(async {
                let server = Server::bind(echo, Arc::new(StdoutSink)).await?;
                server.run().await
            })?;
        }
    }

    Ok(())
}

/// Clients do one thing at a time, so a single thread is enough.
fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

fn server_runtime(workers: Option<usize>) -> std::io::Result<tokio::runtime::Runtime> {
    let workers = workers.unwrap_or_else(num_cpus);
    info!(workers, "Using multi-threaded runtime");

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
