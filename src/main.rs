//! B2 exporter -- per-bucket usage metrics for Backblaze B2.
//!
//! Polls the account on a fixed interval and republishes per-bucket
//! usage statistics as labeled gauges on an HTTP `/metrics` endpoint.
//! A failed refresh keeps serving the previous snapshot; transient
//! backend trouble never crashes the process.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use b2_exporter::config::Config;
use b2_exporter::metrics::PublishedMetrics;
use b2_exporter::storage::b2::B2Client;
use b2_exporter::storage::client::StorageClient;

/// Command-line arguments for the exporter.
#[derive(Parser, Debug)]
#[command(
    name = "b2-exporter",
    version,
    about = "Prometheus exporter for Backblaze B2 bucket usage"
)]
struct Cli {
    /// Override the metrics port (METRICS_PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the seconds between refresh cycles (UPDATE_INTERVAL).
    #[arg(short, long)]
    interval: Option<u64>,

    /// Bind host for the metrics endpoint.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    if let Some(port) = cli.port {
        config.metrics_port = port;
    }
    if let Some(interval) = cli.interval {
        config.update_interval_secs = interval;
    }

    let client = B2Client::new(
        config.application_key_id.clone(),
        config.application_key.clone(),
    )?;

    // Fail fast on rejected credentials, before the metrics port is bound.
    client.authorize().await?;

    let metrics = Arc::new(PublishedMetrics::new()?);
    let state = Arc::new(b2_exporter::AppState {
        metrics: metrics.clone(),
    });

    let client: Arc<dyn StorageClient> = Arc::new(client);
    let interval = Duration::from_secs(config.update_interval_secs);
    info!(
        interval_secs = config.update_interval_secs,
        "starting refresh loop"
    );
    tokio::spawn(b2_exporter::refresh::run(client, metrics, interval));

    let app = b2_exporter::server::app(state);
    let bind_addr = format!("{}:{}", cli.host, config.metrics_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("metrics server listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections
    // and let in-flight scrapes finish. The refresh task dies with the
    // process; there is no state to clean up.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("exporter shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
