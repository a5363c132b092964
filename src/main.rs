//! framecast - remote headless-browser streaming server.
//!
//! Main entry point for the framecast CLI and server.

mod app;
mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};

use clap::Parser;
use framecast_cdp::ChromeEngine;
use framecast_config::{ConfigLoader, LoggingConfig};
use framecast_server::{FramecastServer, SignalHandler};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

/// Keeps the non-blocking file writer flushing until exit.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize tracing with a console layer and, when configured, a daily
/// rolling log file.
///
/// `RUST_LOG` wins over the configured level unless `--log-level` was given.
fn init_tracing(logging: &LoggingConfig, forced_level: bool) -> anyhow::Result<()> {
    let env_filter = if forced_level {
        EnvFilter::try_new(&logging.level)?
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?
    };

    let file_layer = match &logging.file_dir {
        Some(dir) => {
            let log_dir = PathBuf::from(ConfigLoader::expand_path(dir));
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("framecast")
                .filename_suffix("log")
                .max_log_files(14)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = app::load_config(&cli)?;
    init_tracing(&config.logging, cli.log_level.is_some())?;

    let report = app::validate(&config)?;
    for warning in &report.warnings {
        warn!("Config: {}", warning);
    }

    let engine = ChromeEngine::new(app::launcher_config(&config));
    match engine.config().resolve_executable() {
        Ok(path) => info!("Using browser {}", path.display()),
        Err(e) => warn!("{}; sessions will fail to start until one is available", e),
    }

    let server = FramecastServer::new(
        Arc::new(engine),
        app::session_options(&config),
        app::server_options(&config),
    );

    let signals = SignalHandler::new();
    signals.setup_os_signals()?;
    server.run(&signals).await?;
    Ok(())
}

fn check_config(cli: &Cli) -> anyhow::Result<()> {
    let config = app::load_config(cli)?;
    let report = app::validate(&config)?;
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::CheckConfig) => check_config(&cli),
        None => run(cli).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("framecast: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
