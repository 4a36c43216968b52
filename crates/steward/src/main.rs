//! Steward binary.
//!
//! Runs a manifest once, validates one, or supervises the executions of a
//! server configuration until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use steward::manifest::Manifest;
use steward::nats::TriggerSubscriber;
use steward::{execute_steps, ServerConfig, Settings, Supervisor};
use steward_ops::Fetcher;

/// Capacity of the trigger channel between NATS and the event runner.
const TRIGGER_BUFFER: usize = 64;

#[derive(Parser)]
#[command(name = "steward")]
#[command(version, about = "Runs step manifests once, on a cadence, or on triggers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a manifest once
    ///
    /// Examples:
    ///     steward run ./deploy.yml
    ///     steward run https://config.example.com/deploy.yml --key TOKEN
    ///     steward run ./deploy.yml --set version=1.4.2
    #[command(verbatim_doc_comment)]
    Run {
        /// Manifest locator: file path, file:// or http(s):// URL
        #[arg(value_name = "MANIFEST")]
        manifest: String,

        /// Key sent when fetching remote locators
        #[arg(short, long, default_value = "")]
        key: String,

        /// Override a manifest variable (key=value), repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Supervise the executions of a server configuration
    Server {
        /// Server configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// Parse a manifest and print the resolved step kinds
    Validate {
        /// Manifest locator: file path, file:// or http(s):// URL
        #[arg(value_name = "MANIFEST")]
        manifest: String,

        /// Key sent when fetching remote locators
        #[arg(short, long, default_value = "")]
        key: String,
    },
}

/// Initialize tracing/logging.
fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| settings.log_filter().into());

    let registry = tracing_subscriber::registry().with(filter);
    if settings.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    init_tracing(&settings);

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { manifest, key, set } => run_once(&settings, &manifest, &key, &set).await,
        Commands::Server { config } => serve(&settings, config).await,
        Commands::Validate { manifest, key } => validate(&settings, &manifest, &key).await,
    }
}

async fn run_once(settings: &Settings, locator: &str, key: &str, set: &[String]) -> Result<()> {
    let fetcher = Fetcher::new();
    let mut manifest = Manifest::load(&fetcher, locator, key, settings.backup_dir()).await?;

    for pair in set {
        let (k, v) = pair
            .split_once('=')
            .with_context(|| format!("Invalid --set value '{}', expected KEY=VALUE", pair))?;
        manifest.variables.insert(k.to_string(), v.to_string());
    }

    tracing::info!(manifest = %locator, steps = manifest.steps.len(), "Running manifest");

    let ctx = manifest.context(&fetcher, key);
    execute_steps(&manifest.steps, &ctx).await?;

    tracing::info!(manifest = %locator, "Manifest complete");
    Ok(())
}

async fn validate(settings: &Settings, locator: &str, key: &str) -> Result<()> {
    let manifest = Manifest::load(&Fetcher::new(), locator, key, settings.backup_dir()).await?;

    for (i, step) in manifest.steps.iter().enumerate() {
        println!("{:>3}  {:<15} {}", i + 1, step.operator.kind(), step.name);
    }
    println!("{} steps, {} variables", manifest.steps.len(), manifest.variables.len());
    Ok(())
}

async fn serve(settings: &Settings, path: PathBuf) -> Result<()> {
    let config = Arc::new(ServerConfig::load(&path)?);
    tracing::info!(
        config = %path.display(),
        executions = config.execution.len(),
        endpoint = %config.endpoint,
        "Server configuration loaded"
    );

    let fetcher = Fetcher::new();
    let mut supervisor = Supervisor::new(config.clone(), settings.backup_dir(), fetcher);

    let forward_cancel = CancellationToken::new();
    let mut forwarder = None;

    let wants_triggers = config.event_executions().next().is_some();
    if wants_triggers && !config.endpoint.is_empty() {
        let subject = config.trigger_subject();
        match TriggerSubscriber::connect(&config.endpoint, &subject).await {
            Ok(subscriber) => {
                let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
                forwarder = Some(tokio::spawn(subscriber.forward(tx, forward_cancel.clone())));
                supervisor = supervisor.with_triggers(rx);
            }
            Err(e) => {
                tracing::error!(endpoint = %config.endpoint, error = %e, "Cannot connect to NATS, event executions disabled");
            }
        }
    } else if wants_triggers {
        tracing::warn!("Event executions configured without an endpoint");
    }

    let report = supervisor.run(shutdown_signal()).await?;

    forward_cancel.cancel();
    if let Some(handle) = forwarder {
        let _ = handle.await;
    }

    tracing::info!(
        cadence_runners = report.cadence_runners,
        event_runner = report.event_runner,
        failed_runners = report.failed_runners,
        "Server stopped"
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
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
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
