//! Mapping Rust field names to the names callers see on the wire.
//!
//! `validator` reports violations under Rust field names. A request type that
//! uses `#[serde(rename_all = "camelCase")]` receives `queueName`, so its
//! messages must say `queueName` too.
//!
//! [`WireNames::of`] asks serde for the field names a type accepts, without
//! decoding anything, and matches each Rust name against them ignoring case,
//! `_` and `-`. That covers every `rename_all` convention. Renames that are
//! not a case change are declared with [`WireNames::rename`].
//!
//! ```rust
//! use serde::Deserialize;
//! use typedapi_validate::WireNames;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct CreateQueue {
//!     queue_name: String,
//!     #[serde(rename = "max")]
//!     max_workers: u32,
//! }
//!
//! let names = WireNames::of::<CreateQueue>().rename("max_workers", "max");
//! assert_eq!(names.resolve("queue_name"), "queueName");
//! assert_eq!(names.resolve("max_workers"), "max");
//! assert_eq!(names.resolve("unknown"), "unknown");
//! ```

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use std::collections::HashMap;

/// Rust field name to wire name lookup for one type's top-level fields.
///
/// Nested paths keep their Rust segment names after the first one.
#[derive(Debug, Clone, Default)]
pub struct WireNames {
    fields: &'static [&'static str],
    renames: HashMap<String, String>,
}

impl WireNames {
    /// Identity mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire names of `T`'s fields as declared to serde.
    ///
    /// Types that do not deserialize from a struct give the identity mapping.
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned,
    {
        let mut fields: &'static [&'static str] = &[];
        let _ = T::deserialize(FieldCollector {
            fields: &mut fields,
        });
        Self {
            fields,
            renames: HashMap::new(),
        }
    }

    /// Declare an explicit wire name for `field`.
    pub fn rename(mut self, field: impl Into<String>, wire: impl Into<String>) -> Self {
        self.renames.insert(field.into(), wire.into());
        self
    }

    /// The wire name for the Rust field `field`, or `field` itself when
    /// nothing matches.
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        if let Some(wire) = self.renames.get(field) {
            return wire;
        }
        if self.fields.iter().any(|wire| *wire == field) {
            return field;
        }

        let key = normalize(field);
        match self.fields.iter().find(|wire| normalize(wire) == key) {
            Some(wire) => *wire,
            None => field,
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Records the field list serde passes to `deserialize_struct`, then stops.
struct FieldCollector<'a> {
    fields: &'a mut &'static [&'static str],
}

impl<'de, 'a> Deserializer<'de> for FieldCollector<'a> {
    type Error = de::value::Error;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        *self.fields = fields;
        Err(de::Error::custom("field names collected"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}
