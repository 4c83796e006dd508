//! # pulse-hub
//!
//! Hub server binary: wires together the verifier, registry, fan-out
//! bridge, and the upstream channel subscriber, then serves HTTP/WebSocket
//! until a shutdown signal.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulse_server::config::HubConfig;
use pulse_server::server::{AppState, router};
use pulse_server::metrics;
use pulse_server::upstream::UpstreamSubscriber;

/// Pulse real-time update hub.
#[derive(Parser, Debug)]
#[command(name = "pulse-hub", about = "Pulse real-time update hub")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8765")]
    port: u16,

    /// WebSocket URL of the external broadcast channel. When omitted the
    /// hub serves connections but no events arrive from outside.
    #[arg(long, env = "PULSE_UPSTREAM_URL")]
    upstream_url: Option<String>,

    /// Minimum log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Initialize the global tracing subscriber with stderr output only.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();
    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    // The secret is environment-only so it never shows up in argv.
    let secret = std::env::var("PULSE_TOKEN_SECRET")
        .context("PULSE_TOKEN_SECRET must be set (shared secret for verifying tokens)")?;

    let mut config = HubConfig::new(secret);
    config.host = cli.host;
    config.port = cli.port;
    config.upstream_url = cli.upstream_url;

    let recorder = metrics::install_recorder();
    let state = AppState::new(config).with_metrics(recorder);
    let _bridge = state.spawn_bridge();

    match &state.config.upstream_url {
        Some(url) => {
            let subscriber = UpstreamSubscriber::new(
                url.clone(),
                state.bus.clone(),
                state.config.upstream_reconnect.clone(),
            );
            drop(tokio::spawn(subscriber.run()));
            tracing::info!(url = %url, "upstream subscriber started");
        }
        None => {
            tracing::warn!("no upstream URL configured; hub runs bus-only");
        }
    }

    let bind = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(
        addr = %listener.local_addr().context("listener has no local addr")?,
        heartbeat_interval_secs = state.config.heartbeat.interval.as_secs(),
        "pulse hub listening"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining");
}
