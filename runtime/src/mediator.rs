//! The dispatcher entry point.
//!
//! A [`Mediator`] resolves capabilities through the handler cache (falling
//! back to the registry), assembles the request pipeline, and runs it under
//! the caller's cancellation token. Notifications fan out to every handler
//! concurrently and report every failure together.

use crate::behaviors::{TimeoutBehavior, ValidationBehavior};
use crate::cache::{HandlerCache, MemoizingHandlerCache, NoOpHandlerCache};
use crate::metrics::{NotificationMetrics, RequestMetrics, StreamMetrics};
use crate::pipeline::{CoreStages, execute};
use crate::resolver::Resolver;
use dispatcher_core::{
    BoxStream, CancellationToken, DispatchError, DispatcherConfig, HandlerFailure,
    HandlerRegistry, Notification, NotificationHandler, PipelineBehavior, Request,
    RequestHandler, RequestPostProcessor, RequestPreProcessor, StreamRequest,
    StreamRequestHandler, short_type_name,
};
use futures::stream::{self, StreamExt};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Behavior chain for one dispatch; built-ins plus a few registered behaviors
/// fit without a heap allocation.
type BehaviorChain<R> = SmallVec<[Arc<dyn PipelineBehavior<R>>; 4]>;

/// In-process request/notification dispatcher.
///
/// # Example
///
/// ```ignore
/// use dispatcher_core::{DispatcherConfig, ServiceRegistry};
/// use dispatcher_runtime::Mediator;
///
/// let registry = Arc::new(ServiceRegistry::new());
/// registry.register_handler::<Ping, _>(PingHandler);
///
/// let mediator = Mediator::new(registry, DispatcherConfig::default())?;
/// let pong = mediator.send(&Ping).await?;
/// ```
pub struct Mediator {
    registry: Arc<dyn HandlerRegistry>,
    resolver: Resolver,
    config: DispatcherConfig,
    timeout: Arc<TimeoutBehavior>,
    validation: Arc<ValidationBehavior>,
}

impl Mediator {
    /// Create a mediator over `registry`.
    ///
    /// Uses a [`MemoizingHandlerCache`] when caching is enabled, otherwise a
    /// [`NoOpHandlerCache`] that resolves fresh on every call.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidArgument`] if `config` is invalid.
    pub fn new(
        registry: Arc<dyn HandlerRegistry>,
        config: DispatcherConfig,
    ) -> Result<Self, DispatchError> {
        config.validate()?;

        let cache: Arc<dyn HandlerCache> = if config.caching_enabled {
            Arc::new(
                MemoizingHandlerCache::new(Arc::clone(&registry))
                    .with_metrics(config.metrics_enabled),
            )
        } else {
            Arc::new(NoOpHandlerCache::new(Arc::clone(&registry)))
        };

        tracing::debug!(
            caching = config.caching_enabled,
            timeouts = config.timeouts_enabled,
            validation = config.validation_enabled,
            default_timeout_ms = config.default_timeout.as_millis(),
            "Mediator created"
        );

        Ok(Self::assemble(registry, cache, config))
    }

    /// Replace the handler cache, keeping the registry and configuration
    #[must_use]
    pub fn with_cache(self, cache: Arc<dyn HandlerCache>) -> Self {
        Self::assemble(self.registry, cache, self.config)
    }

    fn assemble(
        registry: Arc<dyn HandlerRegistry>,
        cache: Arc<dyn HandlerCache>,
        config: DispatcherConfig,
    ) -> Self {
        let resolver = Resolver::new(cache, Arc::clone(&registry));
        let timeout = Arc::new(TimeoutBehavior::new(&config));
        let validation = Arc::new(ValidationBehavior::new(
            resolver.clone(),
            config.max_concurrent_validators,
        ));
        Self {
            registry,
            resolver,
            config,
            timeout,
            validation,
        }
    }

    /// The handler cache lookups go through
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn HandlerCache> {
        self.resolver.cache()
    }

    /// The configuration this mediator was created with
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatch `request` to its handler with a token that never fires.
    ///
    /// # Errors
    ///
    /// See [`Mediator::send_with`].
    pub async fn send<R: Request>(&self, request: &R) -> Result<R::Response, DispatchError> {
        self.send_with(request, CancellationToken::new()).await
    }

    /// Dispatch `request` through its pipeline under `cancel`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotRegistered`] / [`DispatchError::AmbiguousHandler`]
    ///   if the request does not resolve to exactly one handler
    /// - [`DispatchError::ValidationFailed`] if any validator reports errors
    /// - [`DispatchError::TimedOut`] if the pipeline exceeds its deadline
    /// - [`DispatchError::Cancelled`] if `cancel` fires
    /// - [`DispatchError::HandlerFailed`] for any other failure inside the pipeline
    #[tracing::instrument(
        skip_all,
        name = "dispatcher.send",
        fields(request_type = tracing::field::Empty)
    )]
    pub async fn send_with<R: Request>(
        &self,
        request: &R,
        cancel: CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let request_type = short_type_name::<R>();
        tracing::Span::current().record("request_type", request_type.as_str());

        if self.config.detailed_logging {
            tracing::info!(request_type = %request_type, "Processing request");
        } else {
            tracing::debug!(request_type = %request_type, "Processing request");
        }

        let started = Instant::now();
        let result = self
            .dispatch(request, cancel)
            .await
            .map_err(|error| error.attributed_to(&request_type));
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(_) => {
                tracing::debug!(
                    request_type = %request_type,
                    elapsed_ms = millis(elapsed),
                    "Request completed"
                );
                "ok"
            },
            Err(error) if error.is_cancelled() => {
                tracing::warn!(
                    request_type = %request_type,
                    elapsed_ms = millis(elapsed),
                    "Request cancelled"
                );
                error.kind()
            },
            Err(error) => {
                tracing::error!(
                    request_type = %request_type,
                    elapsed_ms = millis(elapsed),
                    error = %error,
                    "Request failed"
                );
                error.kind()
            },
        };

        if self.config.metrics_enabled {
            RequestMetrics::record(&request_type, outcome, elapsed);
        }

        result
    }

    async fn dispatch<R: Request>(
        &self,
        request: &R,
        cancel: CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let handler = self.resolver.one::<dyn RequestHandler<R>>()?;

        let mut behaviors: BehaviorChain<R> = SmallVec::new();
        if self.config.timeouts_enabled {
            behaviors.push(Arc::clone(&self.timeout) as Arc<dyn PipelineBehavior<R>>);
        }
        if self.config.validation_enabled {
            behaviors.push(Arc::clone(&self.validation) as Arc<dyn PipelineBehavior<R>>);
        }
        behaviors.extend(self.resolver.many::<dyn PipelineBehavior<R>>()?);

        let stages = CoreStages {
            pre_processors: self.resolver.many::<dyn RequestPreProcessor<R>>()?,
            handler,
            post_processors: self.resolver.many::<dyn RequestPostProcessor<R>>()?,
        };

        tracing::trace!(behaviors = behaviors.len(), "Pipeline assembled");
        execute(request, &behaviors, stages, cancel).await
    }

    /// Publish `notification` to every handler with a token that never fires.
    ///
    /// # Errors
    ///
    /// See [`Mediator::publish_with`].
    pub async fn publish<N: Notification>(&self, notification: &N) -> Result<(), DispatchError> {
        self.publish_with(notification, CancellationToken::new()).await
    }

    /// Publish `notification` to every registered handler under `cancel`.
    ///
    /// Handlers run concurrently, at most `max_concurrent_notifications` at a
    /// time. Every handler runs to completion regardless of sibling
    /// failures. No registered handlers is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotificationFailed`] listing every handler
    /// that failed, each tagged as cancelled or faulted.
    #[tracing::instrument(
        skip_all,
        name = "dispatcher.publish",
        fields(notification_type = tracing::field::Empty)
    )]
    pub async fn publish_with<N: Notification>(
        &self,
        notification: &N,
        cancel: CancellationToken,
    ) -> Result<(), DispatchError> {
        let notification_type = short_type_name::<N>();
        tracing::Span::current().record("notification_type", notification_type.as_str());

        let handlers = self
            .resolver
            .many::<dyn NotificationHandler<N>>()
            .map_err(|error| error.attributed_to(&notification_type))?;

        if handlers.is_empty() {
            tracing::debug!(
                notification_type = %notification_type,
                "No handlers registered for notification"
            );
            return Ok(());
        }

        if self.config.detailed_logging {
            tracing::info!(
                notification_type = %notification_type,
                handler_count = handlers.len(),
                "Publishing notification"
            );
        } else {
            tracing::debug!(
                notification_type = %notification_type,
                handler_count = handlers.len(),
                "Publishing notification"
            );
        }

        let started = Instant::now();
        let failures: Vec<HandlerFailure> = stream::iter(&handlers)
            .map(|handler| {
                let cancel = cancel.clone();
                let notification_type = notification_type.as_str();
                async move {
                    handler
                        .handle(notification, cancel)
                        .await
                        .map_err(|error| {
                            HandlerFailure::new(
                                handler.name(),
                                error.attributed_to(notification_type),
                            )
                        })
                }
            })
            .buffer_unordered(self.config.max_concurrent_notifications)
            .filter_map(|outcome| async move { outcome.err() })
            .collect()
            .await;
        let elapsed = started.elapsed();

        if self.config.metrics_enabled {
            NotificationMetrics::record(&notification_type, failures.len(), elapsed);
        }

        if failures.is_empty() {
            tracing::debug!(
                notification_type = %notification_type,
                handler_count = handlers.len(),
                elapsed_ms = millis(elapsed),
                "Notification published"
            );
            return Ok(());
        }

        for failure in &failures {
            tracing::error!(
                notification_type = %notification_type,
                handler = %failure.handler,
                kind = ?failure.kind,
                error = %failure.error,
                "Notification handler failed"
            );
        }

        Err(DispatchError::NotificationFailed {
            notification_type,
            total: handlers.len(),
            failures,
        })
    }

    /// Open the item stream for `request` with a token that never fires.
    ///
    /// # Errors
    ///
    /// See [`Mediator::create_stream_with`].
    pub fn create_stream<'a, R: StreamRequest>(
        &self,
        request: &'a R,
    ) -> Result<BoxStream<'a, Result<R::Item, DispatchError>>, DispatchError> {
        self.create_stream_with(request, CancellationToken::new())
    }

    /// Open the item stream for `request`; it ends once `cancel` fires.
    ///
    /// Stream requests do not pass through pipeline behaviors.
    ///
    /// # Errors
    ///
    /// Returns a registration error if the request does not resolve to
    /// exactly one stream handler. Item errors are attributed to the request
    /// type and yielded in the stream.
    pub fn create_stream_with<'a, R: StreamRequest>(
        &self,
        request: &'a R,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'a, Result<R::Item, DispatchError>>, DispatchError> {
        let request_type = short_type_name::<R>();
        let handler = self
            .resolver
            .one::<dyn StreamRequestHandler<R>>()
            .map_err(|error| error.attributed_to(&request_type))?;

        tracing::debug!(request_type = %request_type, "Creating stream");
        if self.config.metrics_enabled {
            StreamMetrics::record_created(&request_type);
        }

        let items = handler
            .handle(request, cancel.clone())
            .take_until(cancel.cancelled_owned())
            .map(move |item| item.map_err(|error| error.attributed_to(&request_type)));

        Ok(Box::pin(items))
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("config", &self.config)
            .field("cache", &self.cache().stats())
            .finish_non_exhaustive()
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use dispatcher_core::{BoxFuture, ServiceRegistry};

    struct Ping;

    impl Request for Ping {
        type Response = &'static str;
    }

    struct PingHandler;

    impl RequestHandler<Ping> for PingHandler {
        fn handle<'a>(
            &'a self,
            _request: &'a Ping,
            _cancel: CancellationToken,
        ) -> BoxFuture<'a, Result<&'static str, DispatchError>> {
            Box::pin(async { Ok("pong") })
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let registry = Arc::new(ServiceRegistry::new());
        let config = DispatcherConfig::default().with_max_concurrent_notifications(0);
        let error = Mediator::new(registry, config).err().unwrap();
        assert!(matches!(error, DispatchError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn send_reaches_handler() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register_handler::<Ping, _>(PingHandler);
        let mediator = Mediator::new(registry, DispatcherConfig::default()).unwrap();

        assert_eq!(mediator.send(&Ping).await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn caching_disabled_uses_pass_through_cache() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.register_handler::<Ping, _>(PingHandler);
        let config = DispatcherConfig::default().with_caching(false);
        let mediator = Mediator::new(registry, config).unwrap();

        mediator.send(&Ping).await.unwrap();
        mediator.send(&Ping).await.unwrap();

        let stats = mediator.cache().stats();
        assert_eq!(stats.hits + stats.misses, 0);
    }
}
