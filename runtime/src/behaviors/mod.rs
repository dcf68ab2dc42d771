//! Built-in pipeline behaviors.
//!
//! The mediator wraps every request in these before any registered behavior:
//! [`TimeoutBehavior`] outermost, then [`ValidationBehavior`]. Either is left
//! out of the chain when disabled in [`DispatcherConfig`](dispatcher_core::DispatcherConfig).

pub mod timeout;
pub mod validation;

pub use timeout::TimeoutBehavior;
pub use validation::ValidationBehavior;
