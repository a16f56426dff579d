use std::path::PathBuf;

use clap::{Parser, Subcommand};
use metrics_exporter_statsd::StatsdBuilder;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use config::{Config, MetricsConfig};

#[derive(Parser)]
#[command(name = "switchboard", about = "Retrying front door for the identity-resolution API")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "example_config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the lookup service.
    Run,
}

#[derive(thiserror::Error, Debug)]
enum SwitchboardError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("credentials error: {0}")]
    Credentials(#[from] resolver::credentials::CredentialsError),
    #[error("could not install statsd recorder: {0}")]
    Metrics(String),
    #[error("server error: {0}")]
    Server(#[from] lookup_router::errors::LookupRouterError),
}

fn main() -> Result<(), SwitchboardError> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    // The guard flushes pending sentry events on drop, so it lives for the
    // whole process.
    let _sentry_guard = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    if let Some(metrics) = &config.metrics {
        install_statsd_recorder(metrics)?;
    }
    shared::metrics_defs::register_all(resolver::metrics_defs::ALL_METRICS);
    shared::metrics_defs::register_all(lookup_router::metrics_defs::ALL_METRICS);

    match cli.command {
        Command::Run => run(config),
    }
}

fn install_statsd_recorder(metrics: &MetricsConfig) -> Result<(), SwitchboardError> {
    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some("switchboard"))
        .map_err(|e| SwitchboardError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|e| SwitchboardError::Metrics(e.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn run(config: Config) -> Result<(), SwitchboardError> {
    // Credentials come from the environment only. A missing key id or
    // secret stops startup here.
    let credentials = resolver::Credentials::from_env()?;
    let client = resolver::IdentityClient::new(credentials, config.upstream.clone());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    info!(
        host = config.listener.host.as_str(),
        port = config.listener.port,
        origin = %config.upstream.origin,
        "starting switchboard"
    );
    lookup_router::run(
        &config.listener.host,
        config.listener.port,
        client,
        shutdown,
    )
    .await?;
    info!("switchboard stopped");

    Ok(())
}
