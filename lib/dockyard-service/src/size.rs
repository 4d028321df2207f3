//! Human-readable memory sizes.

use std::num::ParseIntError;

use bytesize::ByteSize;
use serde_json::Value;
use snafu::{OptionExt as _, ResultExt as _, Snafu};

const MEBIBYTE: u64 = 1024 * 1024;
const GIBIBYTE: u64 = 1024 * MEBIBYTE;

/// A size value that could not be converted to a byte count.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum FormatError {
    /// The value was neither a size string nor, where allowed, a byte count.
    #[snafu(display("Expected {}, got {} instead.", expected, actual))]
    UnexpectedType {
        /// Description of the accepted forms.
        expected: &'static str,

        /// JSON type of the value that was given.
        actual: &'static str,
    },

    /// The size string was empty.
    #[snafu(display("Size must not be empty."))]
    EmptySize,

    /// The size string did not end in a recognized unit.
    #[snafu(display("Size '{}' must end with 'm' (mebibytes) or 'g' (gibibytes).", input))]
    UnknownUnit {
        /// The original size string.
        input: String,
    },

    /// The part of the size string before the unit was not a non-negative base-10 integer.
    #[snafu(display("Size '{}' must start with a non-negative integer.", input))]
    InvalidMagnitude {
        /// The original size string.
        input: String,

        /// Error source.
        source: ParseIntError,
    },

    /// The size does not fit in a 64-bit byte count.
    #[snafu(display("Size '{}' is too large.", input))]
    Overflow {
        /// The original size string.
        input: String,
    },

    /// A raw byte count was negative.
    #[snafu(display("Byte count must not be negative, got {}.", value))]
    NegativeByteCount {
        /// The byte count that was given.
        value: i64,
    },
}

/// Parses a human-readable size such as `512m` or `2g` into a byte count.
///
/// The string is trimmed and lower-cased, and its last character selects the unit: `m` for mebibytes (`1024^2`) or
/// `g` for gibibytes (`1024^3`). Everything before the unit must be a base-10 integer, optionally surrounded by
/// whitespace and with single underscores between digits (`1_024m`). No other units, fractions or negative values are
/// accepted.
///
/// # Errors
///
/// If the string is empty, has no recognized unit, has a malformed magnitude, or overflows a `u64`, an error is
/// returned.
pub fn parse_size(text: &str) -> Result<ByteSize, FormatError> {
    let normalized = text.trim().to_lowercase();
    let unit = normalized.chars().last().context(EmptySize)?;
    let multiplier = match unit {
        'm' => MEBIBYTE,
        'g' => GIBIBYTE,
        _ => return UnknownUnit { input: text }.fail(),
    };

    let magnitude = &normalized[..normalized.len() - unit.len_utf8()];
    let value = parse_magnitude(magnitude).context(InvalidMagnitude { input: text })?;

    value
        .checked_mul(multiplier)
        .map(ByteSize::b)
        .context(Overflow { input: text })
}

fn parse_magnitude(magnitude: &str) -> Result<u64, ParseIntError> {
    let magnitude = magnitude.trim();
    let grouped = magnitude.contains('_')
        && magnitude
            .split('_')
            .all(|group| !group.is_empty() && group.bytes().all(|b| b.is_ascii_digit()));

    if grouped {
        magnitude.replace('_', "").parse()
    } else {
        magnitude.parse()
    }
}

/// Parses a loosely-typed value as a human-readable size.
///
/// Only strings are accepted; see [`parse_size`].
///
/// # Errors
///
/// If the value is not a string, or is not a valid size string, an error is returned.
pub fn parse_size_value(value: &Value) -> Result<ByteSize, FormatError> {
    match value {
        Value::String(text) => parse_size(text),
        other => UnexpectedType {
            expected: "a size string such as '512m'",
            actual: json_type_name(other),
        }
        .fail(),
    }
}

/// Converts a memory limit value into a byte count.
///
/// Strings are parsed with [`parse_size`], while non-negative integers are already byte counts and pass through
/// unchanged.
///
/// # Errors
///
/// If the value is any other type, a negative integer, or an invalid size string, an error is returned.
pub fn memory_from_value(value: &Value) -> Result<ByteSize, FormatError> {
    match value {
        Value::String(text) => parse_size(text),
        Value::Number(n) => match (n.as_u64(), n.as_i64()) {
            (Some(bytes), _) => Ok(ByteSize::b(bytes)),
            (None, Some(negative)) => NegativeByteCount { value: negative }.fail(),
            (None, None) => UnexpectedType {
                expected: "an integer byte count or a size string such as '512m'",
                actual: "float",
            }
            .fail(),
        },
        other => UnexpectedType {
            expected: "an integer byte count or a size string such as '512m'",
            actual: json_type_name(other),
        }
        .fail(),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn literal_sizes() {
        assert_eq!(parse_size("512m").unwrap().as_u64(), 536_870_912);
        assert_eq!(parse_size("2g").unwrap().as_u64(), 2_147_483_648);
        assert_eq!(parse_size("0m").unwrap().as_u64(), 0);
        assert_eq!(parse_size("512M").unwrap().as_u64(), 536_870_912);
        assert_eq!(parse_size("  1G \n").unwrap().as_u64(), GIBIBYTE);
    }

    #[test]
    fn loosely_written_magnitudes() {
        assert_eq!(parse_size("512 m").unwrap().as_u64(), 536_870_912);
        assert_eq!(parse_size("1_0m").unwrap().as_u64(), 10 * MEBIBYTE);
        assert_eq!(parse_size("1_024 G").unwrap().as_u64(), 1024 * GIBIBYTE);

        for input in ["_1m", "1_m", "1__0m", "1 0m", "+_1m"] {
            assert!(
                matches!(parse_size(input), Err(FormatError::InvalidMagnitude { .. })),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn rejected_sizes() {
        assert!(matches!(parse_size("512"), Err(FormatError::UnknownUnit { .. })));
        assert!(matches!(parse_size("512k"), Err(FormatError::UnknownUnit { .. })));
        assert!(matches!(parse_size(""), Err(FormatError::EmptySize)));
        assert!(matches!(parse_size("   "), Err(FormatError::EmptySize)));
        assert!(matches!(parse_size("m"), Err(FormatError::InvalidMagnitude { .. })));
        assert!(matches!(parse_size("1.5g"), Err(FormatError::InvalidMagnitude { .. })));
        assert!(matches!(parse_size("-1m"), Err(FormatError::InvalidMagnitude { .. })));
        assert!(matches!(
            parse_size("18446744073709551615g"),
            Err(FormatError::Overflow { .. })
        ));
    }

    #[test]
    fn error_messages_name_the_input() {
        let error = parse_size("512k").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Size '512k' must end with 'm' (mebibytes) or 'g' (gibibytes)."
        );
    }

    #[test]
    fn non_string_values() {
        assert_eq!(parse_size_value(&json!("512m")).unwrap().as_u64(), 536_870_912);
        assert!(matches!(
            parse_size_value(&json!(512)),
            Err(FormatError::UnexpectedType { actual: "integer", .. })
        ));
        assert!(parse_size_value(&json!(null)).is_err());
    }

    #[test]
    fn memory_values() {
        assert_eq!(memory_from_value(&json!("512m")).unwrap().as_u64(), 536_870_912);
        assert_eq!(memory_from_value(&json!(536_870_912)).unwrap().as_u64(), 536_870_912);
        assert!(matches!(
            memory_from_value(&json!(-1)),
            Err(FormatError::NegativeByteCount { value: -1 })
        ));
        assert!(matches!(
            memory_from_value(&json!(1.5)),
            Err(FormatError::UnexpectedType { actual: "float", .. })
        ));
        assert!(matches!(
            memory_from_value(&json!(true)),
            Err(FormatError::UnexpectedType { actual: "boolean", .. })
        ));
    }

    proptest! {
        #[test]
        fn property_mebibytes(n in 0u64..(u64::MAX / MEBIBYTE)) {
            prop_assert_eq!(parse_size(&format!("{}m", n)).unwrap().as_u64(), n * MEBIBYTE);
            prop_assert_eq!(parse_size(&format!("{}M", n)).unwrap().as_u64(), n * MEBIBYTE);
        }

        #[test]
        fn property_gibibytes(n in 0u64..(u64::MAX / GIBIBYTE)) {
            prop_assert_eq!(parse_size(&format!("{}g", n)).unwrap().as_u64(), n * GIBIBYTE);
        }
    }
}
