//! Validation results and the validator capability.
//!
//! Validators never mutate the request. Several validators may be bound to the
//! same request type; the validation behavior runs all of them and unions
//! every error into a single [`ValidationResult`].

use crate::error::DispatchError;
use crate::request::Request;
use crate::{BoxFuture, CancellationToken};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single field-level validation error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Name of the offending field
    pub property: String,
    /// Human-readable reason
    pub message: String,
}

impl ValidationError {
    /// Create a new field-level error
    #[must_use]
    pub fn new(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.message)
    }
}

/// Outcome of one or more validators.
///
/// # Example
///
/// ```
/// use dispatcher_core::ValidationResult;
///
/// let mut result = ValidationResult::success();
/// assert!(result.is_valid());
///
/// result.add_error("email", "is required");
/// assert!(!result.is_valid());
/// assert_eq!(result.summary(), "email: is required");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// A passing result with no errors
    #[must_use]
    pub const fn success() -> Self {
        Self { errors: Vec::new() }
    }

    /// A failing result with a single error
    #[must_use]
    pub fn failure(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![ValidationError::new(property, message)],
        }
    }

    /// A result carrying the given errors (passing if empty)
    #[must_use]
    pub const fn with_errors(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    /// Record another field-level error
    pub fn add_error(&mut self, property: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(property, message));
    }

    /// Append every error from another result
    pub fn merge(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Check if no errors were recorded
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The recorded errors in the order they were added
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Errors joined with `"; "`
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validator capability bound to a request type.
///
/// Returning `Ok` with a failing [`ValidationResult`] rejects the request;
/// returning `Err` means the validator itself could not run.
pub trait Validator<R: Request>: Send + Sync {
    /// Validate the request
    ///
    /// # Errors
    ///
    /// Returns an error if validation could not be performed (not if the
    /// request is invalid).
    fn validate<'a>(
        &'a self,
        request: &'a R,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<ValidationResult, DispatchError>>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn merge_keeps_insertion_order() {
        let mut combined = ValidationResult::failure("name", "is empty");
        combined.merge(ValidationResult::with_errors(vec![
            ValidationError::new("age", "is negative"),
            ValidationError::new("email", "is malformed"),
        ]));

        let properties: Vec<_> = combined.errors().iter().map(|e| e.property.as_str()).collect();
        assert_eq!(properties, vec!["name", "age", "email"]);
    }

    #[test]
    fn serializes_as_error_list() {
        let result = ValidationResult::failure("name", "is empty");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "errors": [{ "property": "name", "message": "is empty" }] })
        );
    }
}
