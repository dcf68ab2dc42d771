//! Ready-made capabilities for dispatcher tests.
//!
//! Every double is generic over the request or notification type it is
//! registered for, so one double serves any test type.

use crate::recorder::Recorder;
use dispatcher_core::{
    BoxFuture, CancellationToken, DispatchError, Next, Notification, NotificationHandler,
    PipelineBehavior, Request, RequestHandler, RequestPostProcessor, RequestPreProcessor,
    ValidationError, ValidationResult, Validator,
};
use std::time::Duration;

/// Sleep for `delay`, or fail with [`DispatchError::Cancelled`] if `cancel`
/// fires first.
async fn cancellable_sleep(delay: Duration, cancel: &CancellationToken) -> Result<(), DispatchError> {
    tokio::select! {
        () = tokio::time::sleep(delay) => Ok(()),
        () = cancel.cancelled() => Err(DispatchError::Cancelled),
    }
}

/// Behavior recording `{label}:before` and `{label}:after` around the rest
/// of the pipeline.
#[derive(Debug, Clone)]
pub struct RecordingBehavior {
    label: String,
    recorder: Recorder,
}

impl RecordingBehavior {
    /// Create a behavior recording into `recorder`
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }
}

impl<R: Request> PipelineBehavior<R> for RecordingBehavior {
    fn handle<'a>(
        &'a self,
        _request: &'a R,
        next: Next<'a, R::Response>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
        Box::pin(async move {
            self.recorder.record(format!("{}:before", self.label));
            let result = next.run(cancel).await;
            self.recorder.record(format!("{}:after", self.label));
            result
        })
    }
}

/// Pre-processor recording its label.
#[derive(Debug, Clone)]
pub struct RecordingPreProcessor {
    label: String,
    recorder: Recorder,
}

impl RecordingPreProcessor {
    /// Create a pre-processor recording into `recorder`
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }
}

impl<R: Request> RequestPreProcessor<R> for RecordingPreProcessor {
    fn process<'a>(
        &'a self,
        _request: &'a R,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            self.recorder.record(self.label.clone());
            Ok(())
        })
    }
}

/// Pre-processor that always fails.
#[derive(Debug, Clone)]
pub struct FailingPreProcessor {
    message: String,
}

impl FailingPreProcessor {
    /// Create a pre-processor failing with `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<R: Request> RequestPreProcessor<R> for FailingPreProcessor {
    fn process<'a>(
        &'a self,
        _request: &'a R,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move { Err(DispatchError::from(anyhow::anyhow!("{}", self.message))) })
    }
}

/// Post-processor recording its label and the handler's response.
///
/// Records `{label}` followed by `{label}={response:?}`.
#[derive(Debug, Clone)]
pub struct RecordingPostProcessor {
    label: String,
    recorder: Recorder,
}

impl RecordingPostProcessor {
    /// Create a post-processor recording into `recorder`
    #[must_use]
    pub fn new(label: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            recorder: recorder.clone(),
        }
    }
}

impl<R> RequestPostProcessor<R> for RecordingPostProcessor
where
    R: Request,
    R::Response: std::fmt::Debug,
{
    fn process<'a>(
        &'a self,
        _request: &'a R,
        response: &'a R::Response,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            self.recorder.record(self.label.clone());
            self.recorder.record(format!("{}={response:?}", self.label));
            Ok(())
        })
    }
}

/// Post-processor that always fails.
#[derive(Debug, Clone)]
pub struct FailingPostProcessor {
    message: String,
}

impl FailingPostProcessor {
    /// Create a post-processor failing with `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<R: Request> RequestPostProcessor<R> for FailingPostProcessor {
    fn process<'a>(
        &'a self,
        _request: &'a R,
        _response: &'a R::Response,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move { Err(DispatchError::from(anyhow::anyhow!("{}", self.message))) })
    }
}

/// Handler answering every request with a clone of a fixed response.
#[derive(Debug, Clone)]
pub struct StaticHandler<T> {
    response: T,
    recorder: Option<Recorder>,
}

impl<T> StaticHandler<T> {
    /// Create a handler answering with `response`
    #[must_use]
    pub const fn new(response: T) -> Self {
        Self {
            response,
            recorder: None,
        }
    }

    /// Also record `handler` into `recorder` on every call
    #[must_use]
    pub fn recording(mut self, recorder: &Recorder) -> Self {
        self.recorder = Some(recorder.clone());
        self
    }
}

impl<R, T> RequestHandler<R> for StaticHandler<T>
where
    R: Request<Response = T>,
    T: Clone + Send + Sync + 'static,
{
    fn handle<'a>(
        &'a self,
        _request: &'a R,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<T, DispatchError>> {
        Box::pin(async move {
            if let Some(recorder) = &self.recorder {
                recorder.record("handler");
            }
            Ok(self.response.clone())
        })
    }
}

/// Handler that waits before answering, honouring cancellation.
#[derive(Debug, Clone)]
pub struct DelayHandler<T> {
    delay: Duration,
    response: T,
}

impl<T> DelayHandler<T> {
    /// Create a handler answering with `response` after `delay`
    #[must_use]
    pub const fn new(delay: Duration, response: T) -> Self {
        Self { delay, response }
    }
}

impl<R, T> RequestHandler<R> for DelayHandler<T>
where
    R: Request<Response = T>,
    T: Clone + Send + Sync + 'static,
{
    fn handle<'a>(
        &'a self,
        _request: &'a R,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<T, DispatchError>> {
        Box::pin(async move {
            cancellable_sleep(self.delay, &cancel).await?;
            Ok::<_, DispatchError>(self.response.clone())
        })
    }
}

/// Handler that always fails with a raw error.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    message: String,
}

impl FailingHandler {
    /// Create a handler failing with `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<R: Request> RequestHandler<R> for FailingHandler {
    fn handle<'a>(
        &'a self,
        _request: &'a R,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
        Box::pin(async move { Err(DispatchError::from(anyhow::anyhow!("{}", self.message))) })
    }
}

/// Validator returning a fixed set of errors for every request.
#[derive(Debug, Clone, Default)]
pub struct StaticValidator {
    errors: Vec<ValidationError>,
}

impl StaticValidator {
    /// Validator that always passes
    #[must_use]
    pub const fn passing() -> Self {
        Self { errors: Vec::new() }
    }

    /// Validator that always reports `errors` as `(property, message)` pairs
    #[must_use]
    pub fn failing<I, P, M>(errors: I) -> Self
    where
        I: IntoIterator<Item = (P, M)>,
        P: Into<String>,
        M: Into<String>,
    {
        Self {
            errors: errors
                .into_iter()
                .map(|(property, message)| ValidationError::new(property, message))
                .collect(),
        }
    }
}

impl<R: Request> Validator<R> for StaticValidator {
    fn validate<'a>(
        &'a self,
        _request: &'a R,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ValidationResult, DispatchError>> {
        Box::pin(async move { Ok(ValidationResult::with_errors(self.errors.clone())) })
    }
}

/// Validator that always fails with a raw error instead of a result.
#[derive(Debug, Clone)]
pub struct FailingValidator {
    message: String,
}

impl FailingValidator {
    /// Create a validator failing with `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<R: Request> Validator<R> for FailingValidator {
    fn validate<'a>(
        &'a self,
        _request: &'a R,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ValidationResult, DispatchError>> {
        Box::pin(async move { Err(DispatchError::from(anyhow::anyhow!("{}", self.message))) })
    }
}

/// Validator that waits before reporting, honouring cancellation.
///
/// Records `label` in the recorder only if it completes.
#[derive(Debug, Clone)]
pub struct DelayValidator {
    label: String,
    delay: Duration,
    errors: Vec<ValidationError>,
    recorder: Recorder,
}

impl DelayValidator {
    /// Create a passing validator named `label` completing after `delay`
    #[must_use]
    pub fn new(label: impl Into<String>, delay: Duration, recorder: &Recorder) -> Self {
        Self {
            label: label.into(),
            delay,
            errors: Vec::new(),
            recorder: recorder.clone(),
        }
    }

    /// Also report `message` against `property` once the delay elapses
    #[must_use]
    pub fn with_error(mut self, property: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.push(ValidationError::new(property, message));
        self
    }
}

impl<R: Request> Validator<R> for DelayValidator {
    fn validate<'a>(
        &'a self,
        _request: &'a R,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ValidationResult, DispatchError>> {
        Box::pin(async move {
            cancellable_sleep(self.delay, &cancel).await?;
            self.recorder.record(self.label.clone());
            Ok::<_, DispatchError>(ValidationResult::with_errors(self.errors.clone()))
        })
    }
}

/// Notification handler recording its name.
#[derive(Debug, Clone)]
pub struct RecordingNotificationHandler {
    name: String,
    recorder: Recorder,
}

impl RecordingNotificationHandler {
    /// Create a handler recording `name` into `recorder`
    #[must_use]
    pub fn new(name: impl Into<String>, recorder: &Recorder) -> Self {
        Self {
            name: name.into(),
            recorder: recorder.clone(),
        }
    }
}

impl<N: Notification> NotificationHandler<N> for RecordingNotificationHandler {
    fn handle<'a>(
        &'a self,
        _notification: &'a N,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            self.recorder.record(self.name.clone());
            Ok(())
        })
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Notification handler that always fails with a raw error.
#[derive(Debug, Clone)]
pub struct FailingNotificationHandler {
    name: String,
    message: String,
}

impl FailingNotificationHandler {
    /// Create a handler named `name` failing with `message`
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl<N: Notification> NotificationHandler<N> for FailingNotificationHandler {
    fn handle<'a>(
        &'a self,
        _notification: &'a N,
        _cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move { Err(DispatchError::from(anyhow::anyhow!("{}", self.message))) })
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Notification handler that waits before completing, honouring cancellation.
///
/// Records `name` in the recorder only if it completes.
#[derive(Debug, Clone)]
pub struct SlowNotificationHandler {
    name: String,
    delay: Duration,
    recorder: Recorder,
}

impl SlowNotificationHandler {
    /// Create a handler named `name` completing after `delay`
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration, recorder: &Recorder) -> Self {
        Self {
            name: name.into(),
            delay,
            recorder: recorder.clone(),
        }
    }
}

impl<N: Notification> NotificationHandler<N> for SlowNotificationHandler {
    fn handle<'a>(
        &'a self,
        _notification: &'a N,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        Box::pin(async move {
            cancellable_sleep(self.delay, &cancel).await?;
            self.recorder.record(self.name.clone());
            Ok::<_, DispatchError>(())
        })
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}
