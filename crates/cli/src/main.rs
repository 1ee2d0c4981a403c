mod activity_commands;
mod pipeline;

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    anyhow::Context,
    botwire_common::LifecyclePoint,
    botwire_config::BotwireConfig,
    botwire_eventhub::SasSigner,
    botwire_metrics::MetricsRecorderConfig,
    clap::{Parser, Subcommand},
    secrecy::Secret,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "botwire", version, about = "Bot pipeline middleware")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the default locations.
    #[arg(long, global = true, env = "BOTWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr before exiting.
    #[arg(long, global = true, default_value_t = false)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a shared access signature for a resource URI.
    Sign {
        /// Resource URI to sign.
        #[arg(long)]
        uri: String,
        /// Shared access policy name (defaults to the configured one).
        #[arg(long)]
        key_name: Option<String>,
        /// Shared access policy key (defaults to the configured one).
        #[arg(long)]
        key: Option<String>,
    },
    /// Run an inbound activity through the receive pipeline.
    Receive {
        /// Activity JSON file, or `-` for stdin.
        #[arg(default_value = "-")]
        input: String,
        /// Seconds to wait for telemetry posts before exiting.
        #[arg(long, default_value_t = 5)]
        drain_secs: u64,
    },
    /// Run an outbound activity through the send pipeline.
    Send {
        /// Activity JSON file, or `-` for stdin.
        #[arg(default_value = "-")]
        input: String,
    },
}

/// Initialise tracing. Logs go to stderr so stdout carries only command output.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Explicit `--config` file, else discovery; environment overrides last.
fn load_config(path: Option<&Path>) -> anyhow::Result<BotwireConfig> {
    let config = match path {
        Some(path) => botwire_config::load_config(path)?,
        None => botwire_config::discover_and_load(),
    };
    Ok(botwire_config::apply_env_overrides(config))
}

fn sign(
    config: &BotwireConfig,
    uri: &str,
    key_name: Option<String>,
    key: Option<String>,
) -> anyhow::Result<()> {
    let key_name = key_name
        .or_else(|| config.eventhub.key_name.clone())
        .context("no key name: pass --key-name or set EVENTHUB_KEYNAME")?;
    let key = key
        .map(Secret::new)
        .or_else(|| config.eventhub.key.clone())
        .context("no key: pass --key or set EVENTHUB_KEY")?;

    let token = SasSigner::new(key_name, key)?.sign(uri, SystemTime::now());
    debug!(expiry = token.expiry, "signed resource uri");
    println!("{token}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);
    debug!(version = env!("CARGO_PKG_VERSION"), "botwire starting");

    let config = load_config(cli.config.as_deref())?;
    let metrics = botwire_metrics::init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled || cli.print_metrics,
        global_labels: config.metrics.labels.clone().into_iter().collect(),
    })?;

    let result = match cli.command {
        Commands::Sign { uri, key_name, key } => sign(&config, &uri, key_name, key),
        Commands::Receive { input, drain_secs } => {
            activity_commands::handle_activity(
                &config,
                LifecyclePoint::Receive,
                &input,
                Duration::from_secs(drain_secs),
            )
            .await
        },
        Commands::Send { input } => {
            activity_commands::handle_activity(&config, LifecyclePoint::Send, &input, Duration::ZERO)
                .await
        },
    };

    if cli.print_metrics {
        eprint!("{}", metrics.render());
    }
    result
}
