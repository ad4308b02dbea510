//! Queue definitions.
//!
//! A queue is a named admission policy. Definitions are validated when they
//! are built, so the admission path never sees a zero limit or period.

use serde::{Deserialize, Serialize};

use dbos_config::{QueueConfig, RateLimitConfig};

use crate::error::QueueError;

/// Limit the number of workflows from a queue started in a given period.
///
/// With `limit = 5` and `period = 10.0`, no more than 5 workflows start in
/// any 10 second window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u32,
    /// Window length in seconds.
    pub period: f64,
}

impl RateLimit {
    pub fn new(limit: u32, period: f64) -> Self {
        Self { limit, period }
    }

    /// Window length in milliseconds, never below 1.
    pub fn period_ms(&self) -> i64 {
        ((self.period * 1000.0).ceil() as i64).max(1)
    }
}

impl From<RateLimitConfig> for RateLimit {
    fn from(config: RateLimitConfig) -> Self {
        Self::new(config.limit, config.period)
    }
}

/// Workflow queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Queue {
    name: String,
    concurrency: Option<u32>,
    limiter: Option<RateLimit>,
}

impl Queue {
    /// Build a validated queue definition.
    pub fn new(
        name: impl Into<String>,
        concurrency: Option<u32>,
        limiter: Option<RateLimit>,
    ) -> Result<Self, QueueError> {
        let name = name.into();
        let invalid = |reason: &str| QueueError::InvalidQueue {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if concurrency == Some(0) {
            return Err(invalid("concurrency must be greater than 0"));
        }
        if let Some(limiter) = limiter {
            if limiter.limit == 0 {
                return Err(invalid("limit must be greater than 0"));
            }
            if !limiter.period.is_finite() || limiter.period <= 0.0 {
                return Err(invalid("period must be a positive number of seconds"));
            }
        }

        Ok(Self {
            name,
            concurrency,
            limiter,
        })
    }

    /// A queue with no limits.
    pub fn unbounded(name: impl Into<String>) -> Result<Self, QueueError> {
        Self::new(name, None, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> Option<u32> {
        self.concurrency
    }

    pub fn limiter(&self) -> Option<RateLimit> {
        self.limiter
    }

    pub fn is_unbounded(&self) -> bool {
        self.concurrency.is_none() && self.limiter.is_none()
    }
}

impl TryFrom<&QueueConfig> for Queue {
    type Error = QueueError;

    fn try_from(config: &QueueConfig) -> Result<Self, Self::Error> {
        Queue::new(
            config.name.clone(),
            config.concurrency,
            config.limiter.map(RateLimit::from),
        )
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
