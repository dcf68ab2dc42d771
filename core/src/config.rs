//! Dispatcher configuration.
//!
//! Configuration is an explicit value handed to the mediator and to each
//! built-in behavior at construction. There is no global settings object.
//!
//! # Example
//!
//! ```
//! use dispatcher_core::DispatcherConfig;
//! use std::time::Duration;
//!
//! let config = DispatcherConfig::default()
//!     .with_default_timeout(Duration::from_secs(5))
//!     .with_max_concurrent_notifications(16);
//!
//! assert!(config.validate().is_ok());
//! ```

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a mediator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)] // Independent feature switches
pub struct DispatcherConfig {
    /// Deadline applied to requests that do not declare their own
    pub default_timeout: Duration,
    /// Install the timeout behavior
    pub timeouts_enabled: bool,
    /// Install the validation behavior
    pub validation_enabled: bool,
    /// Memoize registry lookups
    pub caching_enabled: bool,
    /// Emit metrics through the `metrics` facade
    pub metrics_enabled: bool,
    /// Log request start events at info instead of debug
    pub detailed_logging: bool,
    /// Upper bound on notification handlers running at once
    pub max_concurrent_notifications: usize,
    /// Upper bound on validators running at once for one request
    pub max_concurrent_validators: usize,
}

impl DispatcherConfig {
    /// Preset tuned for throughput: short timeouts, no validation, no metrics
    #[must_use]
    pub fn high_performance() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            validation_enabled: false,
            metrics_enabled: false,
            max_concurrent_notifications: available_parallelism() * 4,
            ..Self::default()
        }
    }

    /// Preset for local development: generous timeouts and detailed logging
    #[must_use]
    pub fn development() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            detailed_logging: true,
            max_concurrent_notifications: available_parallelism(),
            ..Self::default()
        }
    }

    /// Preset for production deployments
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Set the default request timeout
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Enable or disable the timeout behavior
    #[must_use]
    pub const fn with_timeouts(mut self, enabled: bool) -> Self {
        self.timeouts_enabled = enabled;
        self
    }

    /// Enable or disable the validation behavior
    #[must_use]
    pub const fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// Enable or disable handler caching
    #[must_use]
    pub const fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Enable or disable metrics emission
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Enable or disable detailed logging
    #[must_use]
    pub const fn with_detailed_logging(mut self, enabled: bool) -> Self {
        self.detailed_logging = enabled;
        self
    }

    /// Set the notification fan-out concurrency limit
    #[must_use]
    pub const fn with_max_concurrent_notifications(mut self, limit: usize) -> Self {
        self.max_concurrent_notifications = limit;
        self
    }

    /// Set the validator concurrency limit
    #[must_use]
    pub const fn with_max_concurrent_validators(mut self, limit: usize) -> Self {
        self.max_concurrent_validators = limit;
        self
    }

    /// Check the configuration for values the dispatcher cannot honor
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidArgument`] if the default timeout is
    /// zero or either concurrency limit is zero.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.default_timeout.is_zero() {
            return Err(DispatchError::InvalidArgument(
                "default_timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_notifications == 0 {
            return Err(DispatchError::InvalidArgument(
                "max_concurrent_notifications must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_validators == 0 {
            return Err(DispatchError::InvalidArgument(
                "max_concurrent_validators must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            timeouts_enabled: true,
            validation_enabled: true,
            caching_enabled: true,
            metrics_enabled: true,
            detailed_logging: false,
            max_concurrent_notifications: available_parallelism() * 2,
            max_concurrent_validators: 10,
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}
