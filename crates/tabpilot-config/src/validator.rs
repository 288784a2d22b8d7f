//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
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

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_engine(config, &mut result);
        Self::validate_vision(config, &mut result);

        result
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        if config.browser.debug_port == 0 {
            result.add_error(ValidationError::new(
                "browser.debug_port",
                "Port cannot be 0",
            ));
        }

        if let Some(ref path) = config.browser.chrome_path {
            if !path.exists() {
                result.add_warning(ValidationWarning::new(
                    "browser.chrome_path",
                    format!("Browser executable does not exist: {:?}", path),
                ));
            }
        }
    }

    fn validate_engine(config: &Config, result: &mut ValidationResult) {
        let engine = &config.engine;

        if engine.navigation_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "engine.navigation_timeout_secs",
                "navigation_timeout_secs must be greater than 0",
            ));
        }

        if engine.screenshot_max_attempts == 0 {
            result.add_error(ValidationError::new(
                "engine.screenshot_max_attempts",
                "screenshot_max_attempts must be greater than 0",
            ));
        }

        if engine.screenshot_max_attempts > 10 {
            result.add_warning(ValidationWarning::new(
                "engine.screenshot_max_attempts",
                "screenshot_max_attempts is very high, exponential backoff may stall commands",
            ));
        }

        if !engine.search_engine_url.starts_with("http://")
            && !engine.search_engine_url.starts_with("https://")
        {
            result.add_error(ValidationError::new(
                "engine.search_engine_url",
                "search_engine_url must start with http:// or https://",
            ));
        }
    }

    fn validate_vision(config: &Config, result: &mut ValidationResult) {
        let vision = &config.vision;

        if !(0.0..=1.0).contains(&vision.confidence_threshold) {
            result.add_error(ValidationError::new(
                "vision.confidence_threshold",
                "confidence_threshold must be within [0, 1]",
            ));
        }

        if !vision.enabled {
            return;
        }

        if vision.model.is_empty() {
            result.add_error(ValidationError::new(
                "vision.model",
                "model cannot be empty when vision is enabled",
            ));
        }

        if !vision.endpoint.starts_with("http://") && !vision.endpoint.starts_with("https://") {
            result.add_error(ValidationError::new(
                "vision.endpoint",
                "endpoint must start with http:// or https://",
            ));
        }

        if vision.timeout_secs == 0 {
            result.add_warning(ValidationWarning::new(
                "vision.timeout_secs",
                "timeout_secs is 0, vision requests will rely on the transport timeout",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
