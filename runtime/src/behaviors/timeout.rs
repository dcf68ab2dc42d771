//! Deadline enforcement for a request's pipeline.
//!
//! The behavior derives a child of the caller's cancellation token and runs
//! the remainder of the pipeline under it. The child fires when either the
//! caller cancels or the deadline elapses; the caller's own token is never
//! suppressed.
//!
//! Outcome classification:
//!
//! | inner outcome | caller token | child token | result                  |
//! |---------------|--------------|-------------|-------------------------|
//! | `Ok`          | any          | any         | `Ok`                    |
//! | `Cancelled`   | fired        | fired       | `Cancelled`             |
//! | `Cancelled`   | not fired    | fired       | `TimedOut` (deadline)   |
//! | `Cancelled`   | not fired    | not fired   | `Cancelled` (handler's) |
//! | other error   | any          | any         | unchanged               |

use dispatcher_core::{
    BoxFuture, CancellationToken, DispatchError, DispatcherConfig, Next, PipelineBehavior,
    Request, short_type_name,
};
use std::time::Duration;

/// Bounds a request's end-to-end pipeline execution to a deadline.
///
/// The deadline is the request's own [`Request::timeout`] if it declares one,
/// else the configured default. When timeouts are disabled the behavior
/// runs the inner pipeline directly.
#[derive(Debug, Clone)]
pub struct TimeoutBehavior {
    enabled: bool,
    default_timeout: Duration,
}

impl TimeoutBehavior {
    /// Create the behavior from the dispatcher configuration
    #[must_use]
    pub const fn new(config: &DispatcherConfig) -> Self {
        Self {
            enabled: config.timeouts_enabled,
            default_timeout: config.default_timeout,
        }
    }

    /// Deadline applied to `request`
    #[must_use]
    pub fn timeout_for<R: Request>(&self, request: &R) -> Duration {
        request.timeout().unwrap_or(self.default_timeout)
    }

    async fn run_with_deadline<'a, R: Request>(
        &self,
        request: &'a R,
        next: Next<'a, R::Response>,
        cancel: CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let timeout = self.timeout_for(request);
        let deadline = cancel.child_token();

        tracing::debug!(
            request_type = %short_type_name::<R>(),
            timeout_ms = timeout.as_millis(),
            "Setting request deadline"
        );

        let outcome = tokio::select! {
            biased;
            result = next.run(deadline.clone()) => result,
            () = tokio::time::sleep(timeout) => {
                deadline.cancel();
                Err(DispatchError::Cancelled)
            },
            () = deadline.cancelled() => Err(DispatchError::Cancelled),
        };

        match outcome {
            Err(DispatchError::Cancelled) if deadline.is_cancelled() && !cancel.is_cancelled() => {
                let request_type = short_type_name::<R>();
                tracing::error!(
                    request_type = %request_type,
                    timeout_ms = timeout.as_millis(),
                    "Request timed out"
                );
                Err(DispatchError::TimedOut {
                    request_type,
                    timeout,
                    source: Box::new(DispatchError::Cancelled),
                })
            },
            outcome => {
                if outcome.is_ok() {
                    tracing::debug!(
                        request_type = %short_type_name::<R>(),
                        "Request completed within deadline"
                    );
                }
                outcome
            },
        }
    }
}

impl<R: Request> PipelineBehavior<R> for TimeoutBehavior {
    fn handle<'a>(
        &'a self,
        request: &'a R,
        next: Next<'a, R::Response>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
        if !self.enabled {
            return next.run(cancel);
        }
        Box::pin(self.run_with_deadline(request, next, cancel))
    }
}
