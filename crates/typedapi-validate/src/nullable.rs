//! Tri-state nullable field.
//!
//! [`Nullable<T>`] tells apart three situations a plain `Option<T>` folds into
//! two:
//!
//! | JSON payload        | Value                  |
//! |---------------------|------------------------|
//! | key missing         | `Nullable::Absent`     |
//! | `"label": null`     | `Nullable::Null`       |
//! | `"label": "text"`   | `Nullable::Value(..)`  |
//!
//! This is what partial updates need: "leave the field alone", "clear the
//! field" and "set the field" are different instructions.
//!
//! The containing struct must mark the field `#[serde(default)]` (or carry a
//! struct-level `#[serde(default)]`). Without it serde treats a missing key
//! like `null`.
//!
//! ```rust
//! use serde::Deserialize;
//! use typedapi_validate::Nullable;
//!
//! #[derive(Deserialize)]
//! struct UpdateLabel {
//!     #[serde(default)]
//!     label: Nullable<String>,
//! }
//!
//! let req: UpdateLabel = serde_json::from_str("{}").unwrap();
//! assert!(req.label.is_absent());
//!
//! let req: UpdateLabel = serde_json::from_str(r#"{"label":null}"#).unwrap();
//! assert!(req.label.is_null());
//! ```
//!
//! # Validation
//!
//! Rules attached to a `Nullable` field apply to the inner value only when
//! one was sent. `Absent` and `Null` skip the field entirely, while
//! `Value("")` is validated like any other string, so
//! `#[validate(length(min = 1))]` rejects an explicitly empty label.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::{Validate, ValidateLength, ValidateRequired, ValidationErrors};

/// A field that can be absent, explicitly null, or set to a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Nullable<T> {
    /// The field was not present in the payload.
    Absent,
    /// The field was present and set to `null`.
    Null,
    /// The field was present with a value.
    Value(T),
}

impl<T> Nullable<T> {
    /// Returns `true` if the field was not present in the payload.
    ///
    /// Usable with `#[serde(skip_serializing_if = "Nullable::is_absent")]`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns `true` if the field was explicitly `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the field was present, null or not.
    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Returns the value if one was sent.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The value handed to validation rules.
    ///
    /// `Absent` and `Null` yield `None`, which makes rules skip the field.
    /// `Value` yields the inner value even when it is the type's zero value.
    pub fn for_validation(&self) -> Option<&T> {
        self.value()
    }

    /// Converts to `Option<Option<T>>`: `None` when absent, `Some(None)` when
    /// null.
    pub fn into_option(self) -> Option<Option<T>> {
        match self {
            Self::Absent => None,
            Self::Null => Some(None),
            Self::Value(v) => Some(Some(v)),
        }
    }

    /// Maps the inner value, preserving absence and nullness.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Nullable<U> {
        match self {
            Self::Absent => Nullable::Absent,
            Self::Null => Nullable::Null,
            Self::Value(v) => Nullable::Value(f(v)),
        }
    }

    /// Borrowing view of the field.
    pub fn as_ref(&self) -> Nullable<&T> {
        match self {
            Self::Absent => Nullable::Absent,
            Self::Null => Nullable::Null,
            Self::Value(v) => Nullable::Value(v),
        }
    }
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    /// A present field: `None` becomes `Null`.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        }
    }
}

impl<'de, T> Deserialize<'de> for Nullable<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the key is present; missing keys come from Default.
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

impl<T> Serialize for Nullable<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Value(v) => serializer.serialize_some(v),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<T> ValidateLength<u64> for Nullable<T>
where
    T: ValidateLength<u64>,
{
    fn length(&self) -> Option<u64> {
        self.for_validation().and_then(|v| v.length())
    }
}

impl<T> ValidateRequired for Nullable<T> {
    fn is_some(&self) -> bool {
        self.for_validation().is_some()
    }
}

impl<T> Validate for Nullable<T>
where
    T: Validate,
{
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self.for_validation() {
            Some(v) => v.validate(),
            None => Ok(()),
        }
    }
}
