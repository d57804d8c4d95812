use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use topic_consumer::config::load_environment;
use topic_consumer::lifecycle::ConsumerLifecycle;
use topic_consumer::pulsar_client::PulsarConnector;
use topic_consumer::shutdown::{install_signal_listener, shutdown_channel};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "topic-consumer", version, about = "Consume a Pulsar topic with OAuth2 client credentials")]
struct Cli {
    /// Environment name used to pick the env file (dev, qa, stage, prod).
    #[arg(long = "env", value_name = "NAME")]
    environment: Option<String>,

    #[arg(long, value_name = "DIR", default_value = ".")]
    config_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(error = %format!("{error:#}"), "topic consumer exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let loaded = load_environment(&cli.config_dir, cli.environment.as_deref())
        .context("load environment configuration")?;

    info!(
        environment = %loaded.environment,
        config_file = %loaded.env_file,
        config_path = %loaded.path.display(),
        log_filter = %env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        version = env!("CARGO_PKG_VERSION"),
        "pulsar consumer starting"
    );

    let trigger = shutdown_channel();
    let signal_handle =
        install_signal_listener(trigger.clone()).context("register signal handlers")?;

    let mut lifecycle = ConsumerLifecycle::new(PulsarConnector);
    let outcome = lifecycle.run(|name| env::var(name).ok(), &trigger).await;

    signal_handle.abort();
    let _ = signal_handle.await;

    if let Some(reason) = trigger.reason() {
        info!(reason = reason.as_str(), "shutdown requested");
    }

    outcome.context("run pulsar consumer")
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
