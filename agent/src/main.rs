//! Pushagent - Entry Point
//!
//! Runs one docker image upload for a deployment: the command payload comes
//! from `--command`, `--command-file` or stdin.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pushagent::deploy::docker::DockerCli;
use pushagent::deploy::retry::RetryPolicy;
use pushagent::deploy::uploader::Uploader;
use pushagent::http::client::HttpClient;
use pushagent::logs::{init_logging, LogLevel, LogOptions};
use pushagent::storage::settings::{Settings, DEFAULT_SETTINGS_PATH};
use pushagent::utils::version_info;

#[derive(Debug, Parser)]
#[command(name = "pushagent", about = "Upload a deployment image to its registry", version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Command payload as JSON
    #[arg(long, conflicts_with = "command_file")]
    command: Option<String>,

    /// File holding the command payload
    #[arg(long)]
    command_file: Option<PathBuf>,

    /// Control plane base URL
    #[arg(long, env = "PUSHAGENT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Control plane API token
    #[arg(long, env = "PUSHAGENT_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Print build information and exit
    #[arg(long)]
    version_info: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version_info {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load_or_default(&cli.settings)
        .await
        .with_context(|| format!("Unable to read settings file {}", cli.settings.display()))?;

    if let Some(url) = cli.backend_url {
        settings.backend.base_url = url;
    }
    if let Some(token) = cli.api_token {
        settings.backend.api_token = Some(SecretString::from(token));
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let payload = read_payload(cli.command, cli.command_file).await?;

    let client = HttpClient::with_timeout(
        &settings.backend.base_url,
        settings.backend.api_token.clone(),
        Duration::from_secs(settings.backend.request_timeout_secs),
    )?;
    let uploader = Uploader::new(
        Arc::new(client),
        Arc::new(DockerCli::new(settings.docker.binary.clone())),
        RetryPolicy::from(&settings.retry),
    );

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_shutdown(cancel.clone(), settings.deadline()));

    let result = uploader.run(&payload, &cancel).await;
    watcher.abort();

    let report = result?;
    info!(
        deployment = %report.deployment_id,
        registry = %report.registry_url,
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Upload finished"
    );
    Ok(())
}

async fn read_payload(
    command: Option<String>,
    command_file: Option<PathBuf>,
) -> anyhow::Result<String> {
    if let Some(command) = command {
        return Ok(command);
    }

    if let Some(path) = command_file {
        return tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Unable to read command file {}", path.display()));
    }

    let mut payload = String::new();
    tokio::io::stdin()
        .read_to_string(&mut payload)
        .await
        .context("Unable to read command payload from stdin")?;
    Ok(payload)
}

/// Cancel the upload on SIGINT/SIGTERM or when the deadline passes
async fn cancel_on_shutdown(cancel: CancellationToken, deadline: Duration) {
    tokio::select! {
        _ = await_shutdown_signal() => {}
        _ = tokio::time::sleep(deadline) => {
            warn!("Upload deadline ({:?}) reached, cancelling...", deadline);
        }
    }
    cancel.cancel();
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, cancelling upload...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, cancelling upload...");
                    }
                }
                return;
            }
            Err(e) => warn!("Unable to listen for SIGTERM: {}", e),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, cancelling upload..."),
        Err(e) => {
            warn!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
