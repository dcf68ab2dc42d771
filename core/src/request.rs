//! Request, notification, and stream request marker traits.
//!
//! A request is owned by exactly one handler; a notification is broadcast to
//! every handler registered for its type. Neither is ever mutated by the
//! dispatcher: both travel through the pipeline by shared reference.

use std::time::Duration;

/// A single-consumer input to a dispatch call.
///
/// Fire-and-forget requests use `()` as their response type.
///
/// # Example
///
/// ```
/// use dispatcher_core::Request;
/// use std::time::Duration;
///
/// struct GenerateReport {
///     account_id: u64,
/// }
///
/// impl Request for GenerateReport {
///     type Response = Vec<u8>;
///
///     fn timeout(&self) -> Option<Duration> {
///         Some(Duration::from_secs(5))
///     }
/// }
/// ```
pub trait Request: Send + Sync + 'static {
    /// Result produced by the request's handler
    type Response: Send + Sync + 'static;

    /// Per-request deadline overriding the configured default timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// A multi-consumer broadcast with no result.
pub trait Notification: Send + Sync + 'static {}

/// A request answered with a stream of items instead of a single response.
pub trait StreamRequest: Send + Sync + 'static {
    /// Item yielded by the stream
    type Item: Send + 'static;
}

/// Type name of `T` without its module path.
///
/// Generic arguments are shortened too, so `app::orders::Get<app::Id>`
/// becomes `Get<Id>`. Used in log fields and error reports.
///
/// ```
/// use dispatcher_core::short_type_name;
///
/// struct CreateOrder;
/// assert_eq!(short_type_name::<CreateOrder>(), "CreateOrder");
/// assert_eq!(short_type_name::<Vec<String>>(), "Vec<String>");
/// ```
#[must_use]
pub fn short_type_name<T: ?Sized>() -> String {
    shorten(std::any::type_name::<T>())
}

pub(crate) fn shorten(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            },
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}
