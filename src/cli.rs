//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// framecast: stream a remote headless browser over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "framecast")]
#[command(about = "Remote headless-browser streaming server")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ./framecast.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Browser executable
    #[arg(long)]
    pub browser: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,

    /// Log level filter (e.g. "debug", "framecast_session=trace")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate and print the effective configuration
    CheckConfig,
}
