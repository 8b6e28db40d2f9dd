mod config;
mod http_server;
mod logger;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use config::ServerConfig;
use gateway_node::GatewayRuntime;
use http_server::GatewayAppState;
use logger::{AdminLoggerLayer, LogBuffer};

/// Content-addressed retrieval gateway: serves `GET /{id}` and friends by
/// cascading through the configured tiers (cache, S3, trusted gateways,
/// chunk assembly) behind the admission gate.
#[derive(Debug, Parser)]
#[command(name = "gateway-server", version)]
struct Cli {
    /// Path to a TOML config file or a `.env` file; omit to use defaults
    /// and `GATEWAY_*` environment variables only.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level (`error`, `warn`, `info`,
    /// `debug`, `trace`).
    #[arg(long)]
    log_level: Option<String>,

    /// Overrides the configured listen address (`host:port`).
    #[arg(long)]
    listen_addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = ServerConfig::load(cli.config.clone()).context("loading configuration")?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(addr) = cli.listen_addr {
        settings.listen_addr = addr;
    }

    let log_buffer = Arc::new(LogBuffer::new(settings.log_buffer_size));
    init_tracing(&settings.log_level, Arc::clone(&log_buffer));

    tracing::info!(listen_addr = %settings.listen_addr, "starting gateway-server");

    let http_client = reqwest::Client::builder()
        .build()
        .context("building the shared HTTP client")?;

    let runtime = Arc::new(
        GatewayRuntime::new(settings.runtime_config(), http_client)
            .await
            .context("constructing gateway runtime")?,
    );
    runtime.spawn_peer_refresh().await;

    let state = GatewayAppState {
        runtime: Arc::clone(&runtime),
        log_buffer,
        admin_token: settings.admin_token.clone(),
    };
    let app = http_server::build_router(state);

    let addr: SocketAddr = settings
        .listen_addr
        .parse()
        .with_context(|| format!("parsing listen address {}", settings.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let shutdown = install_shutdown_signal();

    tracing::info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .await
    .context("serving HTTP")?;

    runtime.shutdown().await;
    tracing::info!("gateway-server shut down cleanly");
    Ok(())
}

fn init_tracing(log_level: &str, log_buffer: Arc<LogBuffer>) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(AdminLoggerLayer { buffer: log_buffer })
        .init();
}

/// Registers SIGTERM/SIGINT flags (teacher's `signal_hook::flag::register`
/// pattern) and bridges them into a [`CancellationToken`] via a polling
/// task, since the flag API itself is synchronous.
fn install_shutdown_signal() -> CancellationToken {
    let flagged = Arc::new(AtomicBool::new(false));
    let _ = flag::register(SIGTERM, Arc::clone(&flagged));
    let _ = flag::register(SIGINT, Arc::clone(&flagged));

    let token = CancellationToken::new();
    let task_token = token.clone();
    tokio::spawn(async move {
        loop {
            if flagged.load(Ordering::Relaxed) {
                tracing::info!("shutdown signal received");
                task_token.cancel();
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });
    token
}
