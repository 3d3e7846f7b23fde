//! markshot service binary

use clap::Parser;
use markshot::server::{self, ServerConfig};
use markshot::{new_engine, EngineConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "markshot",
    version,
    about = "Renders HTML/CSS markup to screenshots over HTTP"
)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Include raw error detail in failure responses
    #[arg(long)]
    dev: bool,

    /// Path to the Chrome/Chromium executable (auto-detected when omitted)
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Launch the browser without its sandbox (needed in some containers)
    #[arg(long)]
    no_sandbox: bool,

    /// Content load deadline in milliseconds
    #[arg(long, default_value_t = 20_000)]
    content_timeout_ms: u64,

    /// Quiescence window after navigation settles, in milliseconds
    #[arg(long, default_value_t = 500)]
    settle_ms: u64,

    /// Overall per-request render deadline in milliseconds
    #[arg(long, default_value_t = 30_000)]
    render_deadline_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let engine = new_engine(EngineConfig {
        chrome_path: args.chrome_path,
        sandbox: !args.no_sandbox,
        content_timeout_ms: args.content_timeout_ms,
        settle_ms: args.settle_ms,
        extra_args: Vec::new(),
    });

    let app = server::router(
        engine,
        ServerConfig {
            dev_mode: args.dev,
            render_deadline_ms: args.render_deadline_ms,
        },
    );

    let listener = TcpListener::bind(args.bind).await?;
    info!("listening on {}", args.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
