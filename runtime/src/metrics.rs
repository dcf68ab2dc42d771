//! Prometheus metrics for the dispatcher.
//!
//! Recording goes through the `metrics` facade, so nothing is exported until
//! a recorder is installed. [`MetricsExporter`] installs the Prometheus one
//! and renders the text exposition format on demand.
//!
//! # Example
//!
//! ```rust,no_run
//! use dispatcher_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... dispatch requests ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Requests dispatched through `send`, labelled by request type and outcome
pub const REQUESTS_TOTAL: &str = "dispatcher_requests_total";
/// End-to-end `send` latency
pub const REQUEST_DURATION: &str = "dispatcher_request_duration_seconds";
/// Notifications published, labelled by notification type
pub const NOTIFICATIONS_TOTAL: &str = "dispatcher_notifications_published_total";
/// Individual notification handler failures
pub const NOTIFICATION_FAILURES_TOTAL: &str = "dispatcher_notification_handler_failures_total";
/// End-to-end `publish` latency
pub const NOTIFICATION_DURATION: &str = "dispatcher_notification_duration_seconds";
/// Handler cache lookups, labelled by outcome (`hit` or `miss`)
pub const CACHE_LOOKUPS_TOTAL: &str = "dispatcher_handler_cache_lookups_total";
/// Streams opened through `create_stream`
pub const STREAMS_TOTAL: &str = "dispatcher_streams_created_total";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders its output.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter with no recorder installed yet
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe dispatcher metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the histogram buckets are rejected,
    /// or [`MetricsError::Install`] if installation fails for a reason other
    /// than a recorder already being installed.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Dispatcher metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping installation");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            },
        }
    }

    /// Handle of the recorder this exporter installed
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

fn register_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of requests dispatched");
    describe_histogram!(REQUEST_DURATION, "Time taken to dispatch a request");
    describe_counter!(NOTIFICATIONS_TOTAL, "Total number of notifications published");
    describe_counter!(
        NOTIFICATION_FAILURES_TOTAL,
        "Total number of notification handler failures"
    );
    describe_histogram!(
        NOTIFICATION_DURATION,
        "Time taken to fan a notification out to its handlers"
    );
    describe_counter!(CACHE_LOOKUPS_TOTAL, "Total number of handler cache lookups");
    describe_counter!(STREAMS_TOTAL, "Total number of streams created");
}

/// Request dispatch metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record a completed `send`
    pub fn record(request_type: &str, outcome: &'static str, duration: Duration) {
        counter!(REQUESTS_TOTAL, "request_type" => request_type.to_string(), "outcome" => outcome)
            .increment(1);
        histogram!(REQUEST_DURATION, "request_type" => request_type.to_string())
            .record(duration.as_secs_f64());
    }
}

/// Notification fan-out metrics recorder.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record a completed `publish` and how many of its handlers failed
    pub fn record(notification_type: &str, failures: usize, duration: Duration) {
        counter!(NOTIFICATIONS_TOTAL, "notification_type" => notification_type.to_string())
            .increment(1);
        if failures > 0 {
            counter!(
                NOTIFICATION_FAILURES_TOTAL,
                "notification_type" => notification_type.to_string()
            )
            .increment(failures as u64);
        }
        histogram!(
            NOTIFICATION_DURATION,
            "notification_type" => notification_type.to_string()
        )
        .record(duration.as_secs_f64());
    }
}

/// Handler cache metrics recorder.
pub struct CacheMetrics;

impl CacheMetrics {
    /// Record a lookup outcome
    pub fn record_lookup(outcome: &'static str) {
        counter!(CACHE_LOOKUPS_TOTAL, "outcome" => outcome).increment(1);
    }
}

/// Stream metrics recorder.
pub struct StreamMetrics;

impl StreamMetrics {
    /// Record a stream being opened
    pub fn record_created(request_type: &str) {
        counter!(STREAMS_TOTAL, "request_type" => request_type.to_string()).increment(1);
    }
}
