//! # Framecast Config
//!
//! Layered configuration for the framecast server: built-in defaults, an
//! optional TOML file with `${VAR}` substitution, then environment overrides.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::{BROWSER_ENV_VARS, ConfigLoader, DEFAULT_CONFIG_FILE};
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
