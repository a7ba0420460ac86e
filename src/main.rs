//! QuestGPT game server
//!
//! Serves story turns from Gemini, rotating across a pool of API keys, and
//! illustrations from Stable Horde.

use anyhow::{Context, Result};
use clap::Parser;
use questgpt_server::{
    config::{Environment, Settings},
    logging::RotatingLogFile,
    server::App,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// QuestGPT game server
#[derive(Parser, Debug)]
#[command(name = "questgpt-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Also write JSON logs to this file (10MB rotation, 5 backups)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }

    init_tracing(&settings.log_level, args.log_file.as_ref())?;

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        host = %settings.host,
        port = %settings.port,
        gemini_keys = settings.gemini_keys.len(),
        model = %settings.generation.model,
        "Starting application"
    );

    let app = App::new(settings)?;

    app.run_with_graceful_shutdown().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Initialize the JSON tracing subscriber, optionally mirrored to a log file
fn init_tracing(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    let console_layer = fmt::layer().json().with_filter(env_filter(log_level));
    let subscriber = tracing_subscriber::registry().with(console_layer);

    match log_file {
        Some(path) => {
            let writer = RotatingLogFile::with_defaults(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            let file_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter(log_level));

            subscriber.with(file_layer).init();
            tracing::info!(path = %path.display(), "File logging enabled");
        }
        None => subscriber.init(),
    }

    Ok(())
}
