//! Validation error types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

/// Trait for translating validation errors.
///
/// A [`Validator`](crate::Validator) built with a translator consults it for
/// every violation before falling back to the built-in English sentence.
pub trait Translator: Send + Sync {
    /// Translate a validation error message.
    ///
    /// # Arguments
    ///
    /// * `code` - The validation rule code (e.g., "required", "length")
    /// * `field` - The field path (e.g., "label", "address.city")
    /// * `params` - Optional parameters for the validation rule
    fn translate(
        &self,
        code: &str,
        field: &str,
        params: Option<&HashMap<String, serde_json::Value>>,
    ) -> Option<String>;
}

/// A single field validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// The field path that failed validation
    pub field: String,
    /// The validation rule code (e.g., "required", "length", "range")
    pub code: String,
    /// Human-readable sentence describing the violation
    pub message: String,
    /// Rule parameters (e.g., min/max values and the offending value)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<HashMap<String, serde_json::Value>>,
}

impl FieldError {
    /// Create a new field error.
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
            params: None,
        }
    }

    /// Create a field error with parameters.
    pub fn with_params(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        params: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
            params: Some(params),
        }
    }
}

/// Validation failure containing every field violation, in a deterministic
/// order (by field path, then by rule order within a field).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed{}", summarize(.fields))]
pub struct ValidationError {
    /// Collection of field-level validation errors
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Create a new validation error with field errors.
    pub fn new(fields: Vec<FieldError>) -> Self {
        Self { fields }
    }

    /// Create a validation error for a single field.
    pub fn field(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(vec![FieldError::new(field, code, message)])
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get the number of field errors.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// The violation surfaced to callers.
    pub fn first(&self) -> Option<&FieldError> {
        self.fields.first()
    }

    /// Add a field error.
    pub fn add(&mut self, error: FieldError) {
        self.fields.push(error);
    }
}

fn summarize(fields: &[FieldError]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        let sep = if i == 0 { ": " } else { "; " };
        let _ = write!(
            out,
            "{sep}field '{}' failed on the '{}' rule",
            field.field, field.code
        );
    }
    out
}
