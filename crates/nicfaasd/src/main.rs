//! nicfaasd: the nicfaas provider daemon.
//!
//! Single binary that assembles:
//! - Placement store (memory, redb or etcd)
//! - Placement scheduler
//! - Dispatcher (offload RPC + cluster reverse proxy)
//! - Provider REST API
//!
//! # Usage
//!
//! ```text
//! nicfaasd serve --port 8080 --store etcd:http://127.0.0.1:2379 --node 20.20.20.101,20.20.20.102
//! ```

mod bootstrap;
mod config;

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{ServeArgs, Settings};

const DEFAULT_LOG_FILTER: &str = "info,nicfaasd=debug,nicfaas=debug";

#[derive(Parser)]
#[command(name = "nicfaasd", about = "nicfaas provider daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "NICFAAS_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the provider API and dispatch function calls.
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let settings = Settings::load(&args)?;
    info!(
        port = settings.port,
        store = %settings.store,
        nodes = ?settings.nodes,
        "nicfaasd starting"
    );

    let router = bootstrap::build_app(&settings).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "provider API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("nicfaasd stopped");
    Ok(())
}
