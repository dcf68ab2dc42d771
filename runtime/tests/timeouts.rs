//! Integration tests for deadline enforcement through the mediator.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use dispatcher_core::{CancellationToken, DispatchError, DispatcherConfig, Request, ServiceRegistry};
use dispatcher_runtime::Mediator;
use dispatcher_testing::{DelayHandler, init_tracing};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;

/// Request declaring its own 50ms budget
#[derive(Debug)]
struct ExportReport;

impl Request for ExportReport {
    type Response = u32;

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_millis(50))
    }
}

/// Request relying on the configured default
#[derive(Debug)]
struct Recalculate;

impl Request for Recalculate {
    type Response = u32;
}

fn mediator<R>(delay: Duration, config: DispatcherConfig) -> Mediator
where
    R: Request<Response = u32>,
{
    let registry = ServiceRegistry::new();
    registry.register_handler::<R, _>(DelayHandler::new(delay, 7_u32));
    Mediator::new(Arc::new(registry), config).unwrap()
}

#[tokio::test]
async fn slow_handler_times_out_with_request_budget() {
    init_tracing();
    let mediator = mediator::<ExportReport>(Duration::from_millis(200), DispatcherConfig::default());

    let error = mediator.send(&ExportReport).await.unwrap_err();

    assert!(error.is_timeout());
    match &error {
        DispatchError::TimedOut {
            request_type,
            timeout,
            ..
        } => {
            assert_eq!(request_type, "ExportReport");
            assert_eq!(*timeout, Duration::from_millis(50));
        },
        other => panic!("expected TimedOut, got {other:?}"),
    }
    let cause = error.source().unwrap();
    assert_eq!(cause.to_string(), "Operation was cancelled");
    assert_eq!(error.to_string(), "Request ExportReport timed out after 50ms");
}

#[tokio::test]
async fn fast_handler_completes_within_budget() {
    let mediator = mediator::<ExportReport>(Duration::from_millis(10), DispatcherConfig::default());

    assert_eq!(mediator.send(&ExportReport).await.unwrap(), 7);
}

#[tokio::test]
async fn default_timeout_applies_without_override() {
    let config = DispatcherConfig::default().with_default_timeout(Duration::from_millis(20));
    let mediator = mediator::<Recalculate>(Duration::from_millis(500), config);

    let error = mediator.send(&Recalculate).await.unwrap_err();
    match error {
        DispatchError::TimedOut { timeout, .. } => {
            assert_eq!(timeout, Duration::from_millis(20));
        },
        other => panic!("expected TimedOut, got {other:?}"),
    }
}

#[tokio::test]
async fn disabled_timeouts_never_fire() {
    let config = DispatcherConfig::default()
        .with_default_timeout(Duration::from_millis(1))
        .with_timeouts(false);
    let mediator = mediator::<Recalculate>(Duration::from_millis(30), config);

    assert_eq!(mediator.send(&Recalculate).await.unwrap(), 7);
}

#[tokio::test]
async fn caller_cancellation_stays_cancellation() {
    let config = DispatcherConfig::default().with_default_timeout(Duration::from_secs(5));
    let mediator = mediator::<Recalculate>(Duration::from_secs(2), config);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let error = mediator.send_with(&Recalculate, cancel).await.unwrap_err();

    assert!(error.is_cancelled());
    assert!(!error.is_timeout());
}

#[tokio::test]
async fn already_cancelled_token_is_cancellation() {
    let mediator = mediator::<ExportReport>(Duration::from_millis(200), DispatcherConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let error = mediator.send_with(&ExportReport, cancel).await.unwrap_err();
    assert!(error.is_cancelled());
}
