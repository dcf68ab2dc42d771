//! # Dispatcher Runtime
//!
//! Runtime for the in-process request/notification dispatcher.
//!
//! This crate provides the [`Mediator`] that resolves handlers, wraps them in
//! their pipeline, and executes it, along with the pieces it is built from.
//!
//! ## Core Components
//!
//! - **Mediator**: entry point for `send`, `publish`, and `create_stream`
//! - **Handler Cache**: memoizes registry lookups and tracks hit/miss counts
//! - **Pipeline**: folds behaviors around pre-processors, the handler, and post-processors
//! - **Behaviors**: built-in timeout and validation behaviors
//!
//! ## Example
//!
//! ```ignore
//! use dispatcher_core::{DispatcherConfig, ServiceRegistry};
//! use dispatcher_runtime::Mediator;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ServiceRegistry::new());
//! registry
//!     .register_handler::<CreateOrder, _>(CreateOrderHandler::new(db))
//!     .register_behavior::<CreateOrder, _>(AuditBehavior)
//!     .register_validator::<CreateOrder, _>(CreateOrderValidator);
//!
//! let mediator = Mediator::new(registry, DispatcherConfig::production())?;
//!
//! let order_id = mediator.send(&CreateOrder { customer, items }).await?;
//! mediator.publish(&OrderPlaced { order_id }).await?;
//! ```

/// Built-in timeout and validation behaviors
pub mod behaviors;

/// Handler cache memoizing registry lookups
pub mod cache;

/// The dispatcher entry point
pub mod mediator;

/// Prometheus metrics for observability
pub mod metrics;

/// Pipeline assembly and execution
pub mod pipeline;

/// Cache-then-registry capability resolution
pub mod resolver;

pub use behaviors::{TimeoutBehavior, ValidationBehavior};
pub use cache::{
    CacheStatistics, HandlerCache, HandlerCacheExt, MemoizingHandlerCache, NoOpHandlerCache,
};
pub use mediator::Mediator;
pub use resolver::Resolver;
