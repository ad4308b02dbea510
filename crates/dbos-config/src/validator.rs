//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::{Config, QueueConfig};

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

    /// Collapse the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
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
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_executor(config, &mut result);
        Self::validate_admin(config, &mut result);
        Self::validate_dispatcher(config, &mut result);
        Self::validate_queues(&config.queues, &mut result);

        Ok(result)
    }

    fn validate_executor(config: &Config, result: &mut ValidationResult) {
        if config.executor.executor_id.is_empty() {
            result.add_error(ValidationError::new(
                "executor.executor_id",
                "executor_id cannot be empty",
            ));
        }
    }

    fn validate_admin(config: &Config, result: &mut ValidationResult) {
        if !config.admin.enabled {
            return;
        }

        if config.admin.port == 0 {
            result.add_error(ValidationError::new("admin.port", "Port cannot be 0"));
        }

        if config.admin.host.is_empty() {
            result.add_error(ValidationError::new("admin.host", "Host cannot be empty"));
        }
    }

    fn validate_dispatcher(config: &Config, result: &mut ValidationResult) {
        let tick = config.dispatcher.tick_interval_ms;
        if tick == 0 {
            result.add_error(ValidationError::new(
                "dispatcher.tick_interval_ms",
                "tick_interval_ms must be greater than 0",
            ));
        } else if tick > 60_000 {
            result.add_warning(ValidationWarning::new(
                "dispatcher.tick_interval_ms",
                "tick interval is above 60s, queued workflows will start slowly",
            ));
        }
    }

    fn validate_queues(queues: &[QueueConfig], result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (index, queue) in queues.iter().enumerate() {
            let path = format!("queues[{}]", index);

            if queue.name.is_empty() {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    "Queue name cannot be empty",
                ));
            } else if !seen.insert(queue.name.as_str()) {
                result.add_error(ValidationError::new(
                    format!("{}.name", path),
                    format!("Queue '{}' is declared more than once", queue.name),
                ));
            }

            if queue.concurrency == Some(0) {
                result.add_error(ValidationError::new(
                    format!("{}.concurrency", path),
                    "concurrency must be greater than 0",
                ));
            }

            if let Some(limiter) = &queue.limiter {
                if limiter.limit == 0 {
                    result.add_error(ValidationError::new(
                        format!("{}.limiter.limit", path),
                        "limit must be greater than 0",
                    ));
                }
                if !limiter.period.is_finite() || limiter.period <= 0.0 {
                    result.add_error(ValidationError::new(
                        format!("{}.limiter.period", path),
                        "period must be a positive number of seconds",
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
