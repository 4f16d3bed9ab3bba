//! chat-resilience service.
//!
//! Loads configuration, installs logging, metrics, and error reporting,
//! starts the component orchestrator, and serves the status API until
//! Ctrl-C or SIGTERM.
//!
//! ```text
//!   config ──▶ logging / metrics / error reporting
//!                    │
//!                    ▼
//!   orchestrator.initialize ──▶ health monitor, rate-limit sweeper
//!                    │
//!                    ▼
//!   HttpServer::run ──(signal)──▶ orchestrator.shutdown
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use chat_resilience::config::{self, loader, ResilienceConfig};
use chat_resilience::http::{AppState, HttpServer};
use chat_resilience::lifecycle::{signals::shutdown_signal, Collaborators, InitOptions};
use chat_resilience::observability::{logging, metrics};
use chat_resilience::reporting;
use chat_resilience::security::RateLimiter;
use chat_resilience::ResilienceOrchestrator;

#[derive(Debug, Parser)]
#[command(name = "chat-resilience", version, about = "Resilience layer for the chat backend")]
struct Cli {
    /// TOML configuration file. Defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config: ResilienceConfig = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => loader::load_from_env()?,
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("chat-resilience v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    reporting::initialize_error_reporting(config.error_reporting.clone());

    let rate_limiter = Arc::new(RateLimiter::new());
    let orchestrator = Arc::new(
        ResilienceOrchestrator::new(Collaborators::in_memory())
            .with_rate_limiter(
                rate_limiter.clone(),
                Duration::from_secs(config.rate_limit.cleanup_interval_secs),
            )
            .with_probe_timeout(Duration::from_millis(config.health_check.timeout_ms)),
    );

    let summary = orchestrator.initialize(InitOptions::from_config(&config)).await;
    if !summary.success {
        tracing::warn!("No component answered its startup probe, serving degraded status");
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let state = AppState::new(&config, orchestrator.clone(), rate_limiter, reporting::reporter());
    let server = HttpServer::new(state, Duration::from_secs(config.listener.request_timeout_secs));
    let served = server.run(listener, shutdown_signal()).await;

    tracing::info!("Shutdown signal received, stopping components");
    orchestrator.shutdown().await;
    let flushed = reporting::reporter().flush().await;
    tracing::debug!(reports = flushed, "Pending error reports flushed");

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
