//! # Dispatcher Core
//!
//! Core traits and types for the in-process request/notification dispatcher.
//!
//! This crate defines the contracts the runtime composes: typed requests and
//! notifications, the handlers that fulfil them, the pipeline behaviors and
//! processors that wrap a handler call, validators, the error taxonomy, the
//! dispatcher configuration, and the handler registry the runtime resolves
//! capabilities from.
//!
//! ## Core Concepts
//!
//! - **Request**: single-consumer input, producing a typed `Response`
//!   (`()` for fire-and-forget requests)
//! - **Notification**: multi-consumer broadcast with no result
//! - **Handler**: the terminal capability fulfilling a request or reacting to a notification
//! - **Pipeline Behavior**: a wrapper around the handler call, ordered by registration
//! - **Pre/Post-Processor**: steps run immediately before/after the handler
//! - **Validator**: produces field-level errors before the handler runs
//! - **Registry**: maps a capability type to its bound implementations
//!
//! ## Example
//!
//! ```ignore
//! use dispatcher_core::*;
//!
//! struct Ping;
//!
//! impl Request for Ping {
//!     type Response = &'static str;
//! }
//!
//! struct PingHandler;
//!
//! impl RequestHandler<Ping> for PingHandler {
//!     fn handle<'a>(
//!         &'a self,
//!         _request: &'a Ping,
//!         _cancel: CancellationToken,
//!     ) -> BoxFuture<'a, Result<&'static str, DispatchError>> {
//!         Box::pin(async { Ok("pong") })
//!     }
//! }
//!
//! let registry = ServiceRegistry::new();
//! registry.register_handler::<Ping, _>(PingHandler);
//! ```

use std::future::Future;
use std::pin::Pin;

pub use tokio_util::sync::CancellationToken;

/// Dispatcher configuration
pub mod config;

/// Error taxonomy shared by every dispatch layer
pub mod error;

/// Handler capability traits
pub mod handler;

/// Pipeline continuation and behavior contract
pub mod pipeline;

/// Capability registry contract and the default in-memory registry
pub mod registry;

/// Request, notification, and stream request marker traits
pub mod request;

/// Validation results and the validator capability
pub mod validation;

pub use config::DispatcherConfig;
pub use error::{DispatchError, FailureKind, HandlerFailure};
pub use handler::{
    NotificationHandler, RequestHandler, RequestPostProcessor, RequestPreProcessor,
    StreamRequestHandler,
};
pub use pipeline::{Next, PipelineBehavior};
pub use registry::{Binding, Capability, HandlerRegistry, HandlerRegistryExt, ServiceRegistry};
pub use request::{Notification, Request, StreamRequest, short_type_name};
pub use validation::{ValidationError, ValidationResult, Validator};

/// Boxed, `Send` future returned by every capability trait.
///
/// The traits return this instead of using `async fn` so they stay
/// dyn-compatible and can be stored as `Arc<dyn Trait>` in the registry.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed, `Send` stream produced by stream request handlers.
pub type BoxStream<'a, T> = Pin<Box<dyn futures::Stream<Item = T> + Send + 'a>>;
