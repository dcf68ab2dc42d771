//! Request validation ahead of the handler.

use crate::resolver::Resolver;
use dispatcher_core::{
    BoxFuture, CancellationToken, DispatchError, Next, PipelineBehavior, Request,
    ValidationResult, Validator, short_type_name,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Runs every registered [`Validator`] for a request and short-circuits the
/// pipeline when any of them reports an error.
///
/// Validators run concurrently, bounded by `max_concurrent`. Their errors are
/// unioned in registration order; no validator's errors are dropped. A
/// validator that fails outright does not stop its siblings.
#[derive(Debug, Clone)]
pub struct ValidationBehavior {
    resolver: Resolver,
    max_concurrent: usize,
}

impl ValidationBehavior {
    /// Create the behavior over the mediator's resolution path
    #[must_use]
    pub fn new(resolver: Resolver, max_concurrent: usize) -> Self {
        Self {
            resolver,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run every validator for `request` and union their results.
    ///
    /// # Errors
    ///
    /// Returns the first validator error in registration order, after all
    /// validators have completed.
    pub async fn validate<R: Request>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, DispatchError> {
        let validators = self.resolver.many::<dyn Validator<R>>()?;
        Self::run_all(&validators, request, cancel, self.max_concurrent).await
    }

    async fn run_all<R: Request>(
        validators: &[Arc<dyn Validator<R>>],
        request: &R,
        cancel: &CancellationToken,
        max_concurrent: usize,
    ) -> Result<ValidationResult, DispatchError> {
        let checks: Vec<BoxFuture<'_, Result<ValidationResult, DispatchError>>> = validators
            .iter()
            .map(|validator| validator.validate(request, cancel.clone()))
            .collect();
        let outcomes: Vec<Result<ValidationResult, DispatchError>> =
            stream::iter(checks).buffered(max_concurrent).collect().await;

        let mut merged = ValidationResult::success();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(result) => merged.merge(result),
                Err(error) if first_error.is_none() => first_error = Some(error),
                Err(error) => {
                    tracing::debug!(error = %error, "Additional validator failure");
                },
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(merged),
        }
    }

    async fn validate_then_continue<'a, R: Request>(
        &'a self,
        request: &'a R,
        next: Next<'a, R::Response>,
        cancel: CancellationToken,
    ) -> Result<R::Response, DispatchError> {
        let validators = self.resolver.many::<dyn Validator<R>>()?;
        if validators.is_empty() {
            return next.run(cancel).await;
        }

        let request_type = short_type_name::<R>();
        tracing::debug!(
            request_type = %request_type,
            validators = validators.len(),
            "Validating request"
        );

        let result = Self::run_all(&validators, request, &cancel, self.max_concurrent).await?;
        if !result.is_valid() {
            tracing::warn!(
                request_type = %request_type,
                errors = result.errors().len(),
                summary = %result.summary(),
                "Request validation failed"
            );
            return Err(DispatchError::ValidationFailed {
                request_type,
                result,
            });
        }

        next.run(cancel).await
    }
}

impl<R: Request> PipelineBehavior<R> for ValidationBehavior {
    fn handle<'a>(
        &'a self,
        request: &'a R,
        next: Next<'a, R::Response>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<R::Response, DispatchError>> {
        Box::pin(self.validate_then_continue(request, next, cancel))
    }
}
