//! # typedapi Validation
//!
//! Validation for typedapi request and response types. Rules are declared
//! with the `validator` crate's `#[derive(Validate)]`; this crate supplies the
//! adapter that runs them and renders violations as sentences, plus the
//! [`Nullable`] tri-state field type.
//!
//! ## Example
//!
//! ```rust
//! use serde::Deserialize;
//! use typedapi_validate::{Nullable, Validator};
//! use validator::Validate;
//!
//! #[derive(Default, Deserialize, Validate)]
//! #[serde(default)]
//! struct UpdateItem {
//!     #[validate(length(min = 1, max = 100))]
//!     label: Nullable<String>,
//! }
//!
//! let validator = Validator::shared();
//!
//! let req: UpdateItem = serde_json::from_str(r#"{"label":null}"#).unwrap();
//! assert!(validator.validate(&req).is_ok());
//!
//! let req: UpdateItem = serde_json::from_str(r#"{"label":""}"#).unwrap();
//! let err = validator.validate(&req).unwrap_err();
//! assert_eq!(
//!     validator.first_violation_message(&err),
//!     "Field 'label' must be at least 1 character(s) long."
//! );
//! ```
//!
//! ## Messages
//!
//! Only the first violation reaches API callers:
//!
//! - `required` - `Field 'message' is required.`
//! - `length` - `Field 'name' must be at least 3 character(s) long.`
//! - `range` - `Field 'age' must be less than or equal to 120.`
//! - `email`, `url`, `regex`, `must_match`, `contains`, `does_not_contain`
//!
//! A `message = "..."` on the rule, or a [`Translator`], replaces the
//! built-in sentence. [`Validator::validate_named`] reports fields under
//! their serde names; see [`WireNames`].

mod adapter;
mod error;
mod nullable;
mod wire;

pub use adapter::Validator;
pub use error::{FieldError, Translator, ValidationError};
pub use nullable::Nullable;
pub use wire::WireNames;

// Re-export the derive so applications need only one import path.
pub use validator::Validate;

/// Prelude module for validation
pub mod prelude {
    pub use crate::adapter::Validator;
    pub use crate::error::{FieldError, ValidationError};
    pub use crate::nullable::Nullable;
    pub use crate::wire::WireNames;
    pub use validator::Validate;
}
