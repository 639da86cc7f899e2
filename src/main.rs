use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

mod certs;
mod config;
mod engine;
mod geoip;
mod ip;
mod listener;
mod middleware;
mod model;
pub mod observability;
mod persistence;
mod pipeline;
mod proxy;
mod queue;
mod rewrite;
mod routing;

use config::EngineConfig;
use engine::Engine;
use geoip::NoopGeoLookup;
use persistence::StaticHostRepository;
use queue::BoundedMemoryQueue;

#[derive(Parser, Debug)]
#[command(version, about = "Reverse-proxy web application firewall", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the engine's TOML config file.
    #[arg(short, long, global = true, default_value = "rampart.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the WAF and serve every configured listener (default).
    Serve,
    /// Parse and validate the config file, then exit.
    Validate,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match EngineConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load config from {}: {error}", args.config.display());
            std::process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Validate => {
            println!(
                "config is valid: {} host(s), {} listener(s)",
                config.hosts.len(),
                config.server.listeners.len()
            );
        }
        Command::Serve => {
            if let Err(error) = run(config).await {
                eprintln!("fatal: {error}");
                std::process::exit(1);
            }
        }
    }
}

async fn run(config: EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let _tracing_guard = observability::init_tracing(&config.observability)?;
    observability::metrics::init_metrics(&config.observability.metrics)?;

    let repository = Arc::new(StaticHostRepository::new(config.hosts.clone()));
    let queue = Arc::new(BoundedMemoryQueue::new(4096));
    let geo = Arc::new(NoopGeoLookup);

    let engine = Engine::new(config, repository, queue, geo)?;
    engine.start().await?;

    shutdown_signal().await;
    tracing::info!("shutdown signal received, draining connections");
    engine.stop().await;

    Ok(())
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
