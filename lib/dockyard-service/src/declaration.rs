//! Raw service declarations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{errors::ValidationError, size::json_type_name};

/// A raw, loosely-typed service declaration.
///
/// This is what a configuration source hands over before normalization: a map of field names to arbitrary values. It
/// is consumed by [`normalize`][crate::normalize] and not retained afterwards.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawDeclaration(Map<String, Value>);

impl RawDeclaration {
    /// Creates an empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning the updated declaration.
    pub fn with<V>(mut self, key: &str, value: V) -> Self
    where
        V: Into<Value>,
    {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Converts an arbitrary value into a declaration.
    ///
    /// # Errors
    ///
    /// If the value is not a map, an error is returned.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ValidationError::NotAMapping {
                actual: json_type_name(&other),
            }),
        }
    }

    /// Returns the value of the given field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the declared `name`, if it is a string.
    ///
    /// Used to label errors for declarations that fail normalization.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub(crate) fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for RawDeclaration {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for RawDeclaration {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}
