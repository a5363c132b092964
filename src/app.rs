//! Wiring from configuration to the running server.

use framecast_cdp::LauncherConfig;
use framecast_config::{Config, ConfigLoader, ConfigValidator, ValidationResult};
use framecast_protocols::Viewport;
use framecast_server::ServerOptions;
use framecast_session::SessionOptions;

use crate::cli::Cli;

/// Resolve the effective configuration: file, then environment, then flags.
pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, cli);
    Ok(config)
}

pub fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(browser) = &cli.browser {
        config.browser.executable = Some(browser.clone());
    }
    if cli.headful {
        config.browser.headless = false;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}

/// Validate, failing on errors. Warnings are returned for logging.
pub fn validate(config: &Config) -> anyhow::Result<ValidationResult> {
    let result = ConfigValidator::validate(config);
    if !result.is_valid() {
        let errors: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(result)
}

pub fn launcher_config(config: &Config) -> LauncherConfig {
    LauncherConfig {
        executable: config.browser.executable.clone(),
        headless: config.browser.headless,
        no_sandbox: config.browser.no_sandbox,
        extra_args: config.browser.extra_args.clone(),
        launch_timeout: config.browser.launch_timeout(),
    }
}

pub fn session_options(config: &Config) -> SessionOptions {
    let session = &config.session;
    SessionOptions {
        default_viewport: Viewport::new(session.default_width, session.default_height).unwrap_or_default(),
        start_timeout: session.start_timeout(),
        navigate_timeout: session.navigate_timeout(),
        jpeg_quality: session.jpeg_quality,
        min_frame_interval: session.min_frame_interval(),
        user_agent: config.browser.user_agent.clone(),
        stealth: config.browser.stealth,
    }
}

pub fn server_options(config: &Config) -> ServerOptions {
    ServerOptions {
        host: config.server.host.clone(),
        port: config.server.port,
        outbound_buffer: config.server.outbound_buffer,
        command_buffer: config.server.command_buffer,
        shutdown_timeout: config.server.shutdown_timeout(),
    }
}
