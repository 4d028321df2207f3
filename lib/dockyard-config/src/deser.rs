//! Deserialization helpers for values that arrive with loose typing.
//!
//! Environment variables only ever carry strings, so settings that are booleans in a YAML file show up as `"true"` or
//! `"1"` when overridden from the environment. The environment provider also parses values that look like numbers or
//! booleans, so string settings can arrive as `123456` or `true`. These helpers are meant to be used with `serde_with`.

use std::fmt;

use serde::{
    de::{Error, Unexpected, Visitor},
    Deserializer,
};
use serde_with::DeserializeAs;

/// Permissively deserializes a boolean.
///
/// Accepted forms:
///
/// - `true` or `false` as a native boolean
/// - `"true"`, `"false"`, `"1"` or `"0"` as a string (case insensitive, surrounding whitespace ignored)
/// - `1` or `0` as an integer
pub struct PermissiveBool;

struct PermissiveBoolVisitor;

impl Visitor<'_> for PermissiveBoolVisitor {
    type Value = bool;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a boolean, a boolean-like string, or 0/1")
    }

    fn visit_bool<E: Error>(self, value: bool) -> Result<bool, E> {
        Ok(value)
    }

    fn visit_str<E: Error>(self, value: &str) -> Result<bool, E> {
        parse_bool_str(value).ok_or_else(|| Error::invalid_value(Unexpected::Str(value), &self))
    }

    fn visit_i64<E: Error>(self, value: i64) -> Result<bool, E> {
        match value {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::invalid_value(Unexpected::Signed(value), &self)),
        }
    }

    fn visit_u64<E: Error>(self, value: u64) -> Result<bool, E> {
        match value {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::invalid_value(Unexpected::Unsigned(value), &self)),
        }
    }
}

impl<'de> DeserializeAs<'de, bool> for PermissiveBool {
    fn deserialize_as<D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PermissiveBoolVisitor)
    }
}

/// Parses a boolean-like string.
///
/// Returns `None` if the string is not one of `true`, `false`, `1` or `0` (case insensitive).
pub fn parse_bool_str(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Permissively deserializes a string.
///
/// Scalar values are rendered to their textual form, so a password of `123456` or `true` set through an environment
/// variable (which the environment provider parses into a number or boolean) still arrives as a string.
pub struct PermissiveString;

struct PermissiveStringVisitor;

impl Visitor<'_> for PermissiveStringVisitor {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string, a number or a boolean")
    }

    fn visit_str<E: Error>(self, value: &str) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_string<E: Error>(self, value: String) -> Result<String, E> {
        Ok(value)
    }

    fn visit_char<E: Error>(self, value: char) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_bool<E: Error>(self, value: bool) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_i64<E: Error>(self, value: i64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_u64<E: Error>(self, value: u64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_f64<E: Error>(self, value: f64) -> Result<String, E> {
        Ok(value.to_string())
    }
}

impl<'de> DeserializeAs<'de, String> for PermissiveString {
    fn deserialize_as<D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(PermissiveStringVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;
    use serde_with::serde_as;

    use super::*;

    #[serde_as]
    #[derive(Deserialize)]
    struct Flag {
        #[serde_as(as = "PermissiveBool")]
        enabled: bool,
    }

    fn flag(value: serde_json::Value) -> Result<bool, serde_json::Error> {
        serde_json::from_value::<Flag>(json!({ "enabled": value })).map(|f| f.enabled)
    }

    #[test]
    fn accepts_loose_forms() {
        assert!(flag(json!(true)).unwrap());
        assert!(flag(json!("TRUE")).unwrap());
        assert!(flag(json!(" 1 ")).unwrap());
        assert!(flag(json!(1)).unwrap());
        assert!(!flag(json!("false")).unwrap());
        assert!(!flag(json!(0)).unwrap());
    }

    #[test]
    fn rejects_everything_else() {
        assert!(flag(json!("yes please")).is_err());
        assert!(flag(json!(2)).is_err());
        assert!(flag(json!([true])).is_err());
    }

    #[serde_as]
    #[derive(Deserialize)]
    struct Secret {
        #[serde_as(as = "PermissiveString")]
        value: String,
    }

    fn secret(value: serde_json::Value) -> Result<String, serde_json::Error> {
        serde_json::from_value::<Secret>(json!({ "value": value })).map(|s| s.value)
    }

    #[test]
    fn strings_from_scalars() {
        assert_eq!(secret(json!("hunter2")).unwrap(), "hunter2");
        assert_eq!(secret(json!(123456)).unwrap(), "123456");
        assert_eq!(secret(json!(-7)).unwrap(), "-7");
        assert_eq!(secret(json!(true)).unwrap(), "true");
        assert_eq!(secret(json!(1.5)).unwrap(), "1.5");
        assert!(secret(json!(["a"])).is_err());
        assert!(secret(json!(null)).is_err());
    }
}
