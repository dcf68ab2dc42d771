//! Pipeline continuation and behavior contract.
//!
//! A pipeline behavior wraps everything inside it: the behaviors registered
//! after it, the pre-processors, the handler, and the post-processors. It
//! receives that remainder as a [`Next`] it may run at most once.
//!
//! ```text
//! behavior₁ → behavior₂ → … → behaviorₙ → [pre → handler → post]
//!     ▲                                                   │
//!     └──────────────── result / error ───────────────────┘
//! ```

use crate::error::DispatchError;
use crate::request::Request;
use crate::{BoxFuture, CancellationToken};

type Continuation<'a, T> =
    Box<dyn FnOnce(CancellationToken) -> BoxFuture<'a, Result<T, DispatchError>> + Send + 'a>;

/// The remainder of a request's pipeline.
///
/// Running it consumes it, so a behavior cannot invoke the inner pipeline
/// twice. The token passed to [`Next::run`] becomes the cancellation signal
/// for everything inside; behaviors that derive a narrower signal (such as a
/// deadline) pass the derived token here.
pub struct Next<'a, T> {
    continuation: Continuation<'a, T>,
}

impl<'a, T> Next<'a, T> {
    /// Wrap a continuation
    pub fn new<F>(continuation: F) -> Self
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'a, Result<T, DispatchError>> + Send + 'a,
    {
        Self {
            continuation: Box::new(continuation),
        }
    }

    /// Run the remainder of the pipeline under the given cancellation signal
    ///
    /// # Errors
    ///
    /// Returns the first failure raised by any inner stage.
    pub fn run(self, cancel: CancellationToken) -> BoxFuture<'a, Result<T, DispatchError>> {
        (self.continuation)(cancel)
    }
}

impl<T> std::fmt::Debug for Next<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Next(<continuation>)")
    }
}

/// A cross-cutting wrapper composed around a request's handler.
///
/// Behaviors for the same request type nest in registration order: the first
/// registered is the outermost wrapper, so it runs its pre-logic first and its
/// post-logic last.
///
/// # Example
///
/// ```
/// use dispatcher_core::{BoxFuture, CancellationToken, DispatchError, Next, PipelineBehavior, Request};
///
/// struct Audit;
///
/// impl<R: Request> PipelineBehavior<R> for Audit {
///     fn handle<'a>(
///         &'a self,
///         _request: &'a R,
///         next: Next<'a, R::Response>,
///         cancel: CancellationToken,
///     ) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
///         Box::pin(async move {
///             let result = next.run(cancel).await;
///             // inspect `result` here
///             result
///         })
///     }
/// }
/// ```
pub trait PipelineBehavior<R: Request>: Send + Sync {
    /// Run this behavior around the remainder of the pipeline
    ///
    /// # Errors
    ///
    /// Returns the behavior's own failure or propagates the inner pipeline's.
    fn handle<'a>(
        &'a self,
        request: &'a R,
        next: Next<'a, R::Response>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>>;
}
