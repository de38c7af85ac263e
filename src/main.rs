//! rtl433-exporter binary entry point.
//!
//! Reads `rtl_433` JSON lines from stdin (or polls a URL given as the only
//! positional argument) and serves the latest reading per sensor on
//! `/metrics`. Core functionality is provided by the `rtl433_exporter` library.

use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rtl433_exporter::{
    AggregateStore, AppConfig, HttpPollSource, Ingestor, StalenessChecker, StdinSource,
    config::parse_duration,
    publisher,
    server::{self, AppState, create_router},
    source,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus exporter for rtl_433 sensor readings
#[derive(Parser, Debug)]
#[command(name = "rtl433-exporter", version, about, long_about = None)]
struct Cli {
    /// URL to poll for rtl_433 output (reads stdin when omitted)
    url: Option<String>,

    /// Path to an optional YAML configuration file
    #[arg(short, long, env = "RTL433_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Metrics server bind address (overrides config file)
    #[arg(long, env = "RTL433_EXPORTER_BIND")]
    bind: Option<String>,

    /// Metrics server port (overrides config file)
    #[arg(long, env = "RTL433_EXPORTER_PORT")]
    port: Option<u16>,

    /// Delay between polls in URL mode, e.g. "60s" (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    poll_interval: Option<Duration>,

    /// Age after which a sample is logged as stale, e.g. "2m" (overrides config file)
    #[arg(long, value_parser = parse_duration)]
    stale_threshold: Option<Duration>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rtl433_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let code = match run(Cli::parse()).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "Exporter failed");
            1
        }
    };

    let _ = std::io::stdout().flush();
    // A pending blocking stdin read cannot be cancelled; exit without waiting for it.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("rtl433-exporter {}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional)
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(url) = cli.url {
        config.poll.url = Some(url);
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(interval) = cli.poll_interval {
        config.poll.interval = interval;
    }
    if let Some(threshold) = cli.stale_threshold {
        config.ingest.stale_threshold = threshold;
    }
    config.validate()?;

    let store = AggregateStore::new();
    let ingestor = Ingestor::new(
        store.clone(),
        StalenessChecker::new(config.ingest.stale_threshold),
    );
    let registry = publisher::registry_for(store.clone(), &config.metrics.namespace)?;

    let addr = SocketAddr::new(config.server.bind.parse::<IpAddr>()?, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let cancel = CancellationToken::new();

    // Start the line source
    let capacity = config.ingest.channel_capacity;
    let handle = if config.is_poll_mode() {
        let source = HttpPollSource::new(config.poll.clone())?;
        tracing::info!(
            url = %source.url(),
            interval = ?config.poll.interval,
            "Polling remote rtl_433 output"
        );
        source::spawn(source, capacity, cancel.clone())
    } else {
        tracing::info!("Reading rtl_433 output from stdin");
        source::spawn(StdinSource::stdin(), capacity, cancel.clone())
    };

    // Start the metrics server
    let app = create_router(AppState {
        registry,
        store,
        stats: ingestor.stats(),
    });
    tracing::info!("Metrics server listening on: http://{}/metrics", addr);
    let server = tokio::spawn(server::serve(listener, app, cancel.clone()));

    tokio::spawn(shutdown_signal(cancel.clone()));

    // Runs until the source closes, fails, or is cancelled
    ingestor.run(handle.lines).await;
    let source_result = handle.task.await?;

    cancel.cancel();
    server.await??;

    source_result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    token.cancel();
}
