//! Handler capability traits.
//!
//! All traits return [`BoxFuture`] rather than using `async fn` so they can be
//! stored as `Arc<dyn Trait>` in the registry. Each receives its own clone of
//! the call tree's [`CancellationToken`] and is expected to return
//! [`DispatchError::Cancelled`] when it observes the token firing.

use crate::error::DispatchError;
use crate::request::{Notification, Request, StreamRequest};
use crate::{BoxFuture, BoxStream, CancellationToken};
use std::sync::Arc;

/// The terminal capability fulfilling a request.
///
/// Exactly one handler must be registered per request type.
///
/// # Example
///
/// ```
/// use dispatcher_core::{BoxFuture, CancellationToken, DispatchError, Request, RequestHandler};
///
/// struct Add(i64, i64);
///
/// impl Request for Add {
///     type Response = i64;
/// }
///
/// struct AddHandler;
///
/// impl RequestHandler<Add> for AddHandler {
///     fn handle<'a>(
///         &'a self,
///         request: &'a Add,
///         _cancel: CancellationToken,
///     ) -> BoxFuture<'a, Result<i64, DispatchError>> {
///         Box::pin(async move { Ok(request.0 + request.1) })
///     }
/// }
/// ```
pub trait RequestHandler<R: Request>: Send + Sync {
    /// Handle the request
    ///
    /// # Errors
    ///
    /// Returns whatever failure the handler encounters; raw failures should
    /// use [`DispatchError::Failed`].
    fn handle<'a>(
        &'a self,
        request: &'a R,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>>;
}

/// A handler reacting to a broadcast notification.
///
/// Any number of handlers may be registered per notification type; they run
/// independently of one another.
pub trait NotificationHandler<N: Notification>: Send + Sync {
    /// Handle the notification
    ///
    /// # Errors
    ///
    /// Returns whatever failure the handler encounters. A failure never
    /// prevents sibling handlers from running.
    fn handle<'a>(
        &'a self,
        notification: &'a N,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;

    /// Name reported in aggregate failure reports
    fn name(&self) -> String {
        crate::request::short_type_name::<Self>()
    }
}

/// Runs before the handler, in registration order.
pub trait RequestPreProcessor<R: Request>: Send + Sync {
    /// Process the request before the handler sees it
    ///
    /// # Errors
    ///
    /// A failure aborts the remaining pre-processors and the handler.
    fn process<'a>(
        &'a self,
        request: &'a R,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;
}

/// Runs after the handler, in registration order, observing its response.
pub trait RequestPostProcessor<R: Request>: Send + Sync {
    /// Process the request and the handler's response
    ///
    /// # Errors
    ///
    /// A failure aborts the remaining post-processors and fails the request.
    fn process<'a>(
        &'a self,
        request: &'a R,
        response: &'a R::Response,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>>;
}

/// The terminal capability answering a stream request.
///
/// The handler receives its own `Arc` so the returned stream can own it
/// for as long as the caller keeps polling.
pub trait StreamRequestHandler<R: StreamRequest>: Send + Sync {
    /// Produce the stream of items for the request
    fn handle<'a>(
        self: Arc<Self>,
        request: &'a R,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<R::Item, DispatchError>>;
}
