//! Error taxonomy for dispatch operations.
//!
//! Every layer that observes an error for logging purposes re-raises it
//! unchanged; the dispatcher never recovers from a handler failure on the
//! caller's behalf. The only aggregation point is notification fan-out, which
//! collects per-handler failures into [`DispatchError::NotificationFailed`].

use crate::validation::ValidationResult;
use std::time::Duration;
use thiserror::Error;

/// Boxed error raised by user code (handlers, behaviors, processors, validators).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while dispatching a request or notification.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An argument to a dispatch operation was invalid
    ///
    /// Always fatal to the call and never retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No implementation is bound to the requested capability
    ///
    /// Indicates a wiring defect.
    #[error("Handler {capability} is not registered")]
    NotRegistered {
        /// Capability that was requested
        capability: String,
    },

    /// More than one implementation is bound to a single-handler capability
    #[error("Handler {capability} is ambiguous: {count} implementations registered")]
    AmbiguousHandler {
        /// Capability that was requested
        capability: String,
        /// Number of bound implementations
        count: usize,
    },

    /// The registry failed to produce a bound implementation
    #[error("Failed to resolve {capability}: {reason}")]
    Registry {
        /// Capability that was requested
        capability: String,
        /// Why resolution failed
        reason: String,
    },

    /// The handler cache could not serve a lookup on its own account
    ///
    /// Registry errors a cache passes through keep their original variant.
    #[error("Handler cache unavailable for {capability}: {reason}")]
    CacheUnavailable {
        /// Capability that was requested
        capability: String,
        /// Why the cache failed
        reason: String,
    },

    /// One or more validators rejected the request
    #[error("Validation failed for {request_type}. Errors: {}", .result.summary())]
    ValidationFailed {
        /// Request type that failed validation
        request_type: String,
        /// Union of every failing validator's errors
        result: ValidationResult,
    },

    /// The request's pipeline exceeded its deadline
    #[error("Request {request_type} timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        /// Request type that timed out
        request_type: String,
        /// Configured budget that elapsed
        timeout: Duration,
        /// The abort the deadline caused
        #[source]
        source: Box<DispatchError>,
    },

    /// The caller's cancellation signal fired
    #[error("Operation was cancelled")]
    Cancelled,

    /// Failure raised by user code, not yet attributed to a request type
    ///
    /// The dispatcher converts this into [`DispatchError::HandlerFailed`]
    /// before returning to the caller.
    #[error("{0}")]
    Failed(#[source] BoxError),

    /// Failure raised by a handler, processor, or behavior
    #[error("Handler for {type_name} failed: {source}")]
    HandlerFailed {
        /// Originating request or notification type
        type_name: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// One or more notification handlers failed
    #[error("{} of {total} handlers failed for {notification_type}", .failures.len())]
    NotificationFailed {
        /// Notification type that was published
        notification_type: String,
        /// Number of handlers that ran
        total: usize,
        /// Every individual failure
        failures: Vec<HandlerFailure>,
    },
}

impl DispatchError {
    /// Wrap an arbitrary failure raised by user code.
    ///
    /// # Example
    ///
    /// ```
    /// use dispatcher_core::DispatchError;
    ///
    /// let error = DispatchError::failed("inventory service unavailable");
    /// assert_eq!(error.to_string(), "inventory service unavailable");
    /// ```
    pub fn failed(source: impl Into<BoxError>) -> Self {
        Self::Failed(source.into())
    }

    /// Check if this error is a caller-initiated cancellation
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is a deadline expiry
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Check if this error is a validation rejection
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. })
    }

    /// Check if this error indicates a wiring defect
    #[must_use]
    pub const fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::NotRegistered { .. } | Self::AmbiguousHandler { .. } | Self::Registry { .. }
        )
    }

    /// Short label used for log fields and metric labels
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotRegistered { .. } => "not_registered",
            Self::AmbiguousHandler { .. } => "ambiguous_handler",
            Self::Registry { .. } => "registry",
            Self::CacheUnavailable { .. } => "cache_unavailable",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Failed(_) | Self::HandlerFailed { .. } => "handler_failed",
            Self::NotificationFailed { .. } => "notification_failed",
        }
    }

    /// Attribute a raw [`DispatchError::Failed`] to the request or
    /// notification type it originated from.
    ///
    /// Every other variant is returned unchanged.
    #[must_use]
    pub fn attributed_to(self, type_name: &str) -> Self {
        match self {
            Self::Failed(source) => Self::HandlerFailed {
                type_name: type_name.to_string(),
                source,
            },
            other => other,
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(error: anyhow::Error) -> Self {
        Self::Failed(error.into())
    }
}

/// Whether a notification handler was aborted or failed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The handler observed the cancellation signal
    Cancelled,
    /// The handler failed for any other reason
    Faulted,
}

/// A single notification handler's failure inside an aggregate report.
#[derive(Debug)]
pub struct HandlerFailure {
    /// Type name of the failing handler
    pub handler: String,
    /// Cancellation vs. any other failure
    pub kind: FailureKind,
    /// The error the handler returned
    pub error: DispatchError,
}

impl HandlerFailure {
    /// Classify a handler's error into a failure record
    #[must_use]
    pub fn new(handler: impl Into<String>, error: DispatchError) -> Self {
        let kind = if error.is_cancelled() {
            FailureKind::Cancelled
        } else {
            FailureKind::Faulted
        };
        Self {
            handler: handler.into(),
            kind,
            error,
        }
    }
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::Cancelled => write!(f, "{} (cancelled): {}", self.handler, self.error),
            FailureKind::Faulted => write!(f, "{}: {}", self.handler, self.error),
        }
    }
}
