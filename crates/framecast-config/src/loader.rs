//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// File name looked up when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "framecast.toml";

/// Browser executable overrides, highest priority first.
pub const BROWSER_ENV_VARS: [&str; 4] = [
    "FRAMECAST_BROWSER_PATH",
    "CHROME_PATH",
    "PUPPETEER_EXECUTABLE_PATH",
    "CHROMIUM_PATH",
];

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit path must exist. Without one, `framecast.toml` in the
    /// working directory and then in the user config directory are tried, and
    /// built-in defaults are used when neither exists. Environment overrides
    /// are applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::discover() {
                Some(path) => Self::load(&path)?,
                None => Config::default(),
            },
        };
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Locate a config file in the usual places.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("framecast").join(DEFAULT_CONFIG_FILE))
            .filter(|path| path.is_file())
    }

    /// Apply process environment overrides.
    pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
        Self::apply_overrides_from(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = BROWSER_ENV_VARS.iter().find_map(|&key| non_empty(key)) {
            config.browser.executable = Some(PathBuf::from(Self::expand_path(path.trim())));
        }

        if let Some(port) = non_empty("PORT") {
            config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "PORT".to_string(),
                message: format!("'{}' is not a valid port", port),
            })?;
        }

        if let Some(host) = non_empty("HOST") {
            config.server.host = host.trim().to_string();
        }

        Ok(())
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.framecast/logs`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}
