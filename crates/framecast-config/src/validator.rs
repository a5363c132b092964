//! Configuration validation.

use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Check if validation passed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Add a warning.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_browser(config, &mut result);
        Self::validate_session(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }

        if config.server.outbound_buffer == 0 {
            result.add_error(ValidationError::new(
                "server.outbound_buffer",
                "outbound_buffer must be greater than 0",
            ));
        }

        if config.server.command_buffer == 0 {
            result.add_error(ValidationError::new(
                "server.command_buffer",
                "command_buffer must be greater than 0",
            ));
        }

        if config.server.shutdown_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "server.shutdown_timeout_secs",
                "shutdown_timeout_secs must be greater than 0",
            ));
        }
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        if config.browser.launch_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "browser.launch_timeout_secs",
                "launch_timeout_secs must be greater than 0",
            ));
        }

        if let Some(ref path) = config.browser.executable {
            if !path.exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.executable",
                    format!("Browser executable does not exist: {:?}", path),
                ));
            }
        }
    }

    fn validate_session(config: &Config, result: &mut ValidationResult) {
        let session = &config.session;

        if session.default_width == 0 || session.default_height == 0 {
            result.add_error(ValidationError::new(
                "session.default_width",
                "Viewport dimensions must be greater than 0",
            ));
        }

        if !(1..=100).contains(&session.jpeg_quality) {
            result.add_error(ValidationError::new(
                "session.jpeg_quality",
                "jpeg_quality must be between 1 and 100",
            ));
        }

        if session.start_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "session.start_timeout_secs",
                "start_timeout_secs must be greater than 0",
            ));
        }

        if session.navigate_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "session.navigate_timeout_secs",
                "navigate_timeout_secs must be greater than 0",
            ));
        }

        if session.min_frame_interval_ms > 1000 {
            result.add_warning(ValidationWarning::new(
                "session.min_frame_interval_ms",
                "min_frame_interval_ms is very high (>1000), streams will update less than once per second",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
