//! # Dispatcher Testing
//!
//! Test doubles and helpers for the in-process dispatcher.
//!
//! This crate provides:
//! - A shared [`Recorder`] that captures the order pipeline stages run in
//! - Recording behaviors, pre-processors, and post-processors
//! - Static, delayed, and failing request handlers
//! - Static validators
//! - Recording, failing, and slow notification handlers
//! - A tracing subscriber initializer for tests
//!
//! ## Example
//!
//! ```ignore
//! use dispatcher_testing::{Recorder, RecordingBehavior, StaticHandler};
//!
//! #[tokio::test]
//! async fn behaviors_nest_in_registration_order() {
//!     let recorder = Recorder::new();
//!     let registry = Arc::new(ServiceRegistry::new());
//!     registry
//!         .register_handler::<Ping, _>(StaticHandler::new("pong").recording(&recorder))
//!         .register_behavior::<Ping, _>(RecordingBehavior::new("outer", &recorder))
//!         .register_behavior::<Ping, _>(RecordingBehavior::new("inner", &recorder));
//!
//!     let mediator = Mediator::new(registry, DispatcherConfig::default()).unwrap();
//!     mediator.send(&Ping).await.unwrap();
//!
//!     assert_eq!(
//!         recorder.entries(),
//!         ["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
//!     );
//! }
//! ```

/// Order recording shared between test doubles
pub mod recorder;

/// Handlers, behaviors, processors, and validators for tests
pub mod doubles;

pub use doubles::{
    DelayHandler, DelayValidator, FailingHandler, FailingNotificationHandler,
    FailingPostProcessor, FailingPreProcessor, FailingValidator, RecordingBehavior,
    RecordingNotificationHandler, RecordingPostProcessor, RecordingPreProcessor,
    SlowNotificationHandler, StaticHandler, StaticValidator,
};
pub use recorder::Recorder;

/// Install a test-friendly tracing subscriber.
///
/// Output goes through the test harness's captured writer and honours
/// `RUST_LOG`, defaulting to `debug` for the dispatcher crates. Safe to call
/// from every test; only the first call installs.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("dispatcher_runtime=debug,dispatcher_core=debug")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}
