//! Prometheus exporter for Kamstrup heat meters.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kamstir_exporter::config::{ExporterConfig, LogFormat};
use kamstir_exporter::{HttpFetcher, HttpServer, MeterCollector};

/// Prometheus exporter for Kamstrup heat meters.
#[derive(Parser, Debug)]
#[command(name = "kamstir-exporter")]
#[command(about = "Export Kamstrup heat meter readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Gateway JSON endpoint to poll on every scrape.
    #[arg(long)]
    device_url: Option<String>,

    /// Gateway request timeout in milliseconds (default: transport default).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// HTTP listen port (overrides the PORT environment variable).
    #[arg(long)]
    port: Option<u16>,

    /// Path of the metrics endpoint.
    #[arg(long)]
    path: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Resolve configuration: defaults, then PORT, then CLI flags
    let mut config = ExporterConfig::from_env()?;
    if let Some(url) = args.device_url {
        config.device.url = url;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.device.timeout_ms = Some(timeout_ms);
    }
    if let Some(port) = args.port {
        config.prometheus.port = port;
    }
    if let Some(path) = args.path {
        config.prometheus.path = path;
    }
    config.logging.level = args.log_level;
    config.logging.format = args.log_format;
    config.validate()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(
        device = %config.device.url,
        timeout_ms = ?config.device.timeout_ms,
        "Starting Kamstir Prometheus Exporter"
    );

    let fetcher = HttpFetcher::new(&config.device).context("Failed to build HTTP client")?;
    let collector = Arc::new(MeterCollector::new(fetcher));

    let listen_addr = config.prometheus.listen_addr();
    let http_server = HttpServer::bind(collector, listen_addr, config.prometheus.path.clone())
        .await
        .context("Cannot start metrics endpoint")?;

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = &mut http_task => {
            anyhow::bail!("HTTP server exited unexpectedly");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!("Exporter stopped");
    Ok(())
}

/// Resolve when the process receives SIGTERM.
async fn terminate() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}
