//! Normalization and batch errors.

use std::fmt::Write as _;

use snafu::Snafu;

use crate::size::FormatError;

/// A declaration that does not describe a valid service.
#[derive(Debug, Snafu)]
pub enum ValidationError {
    /// The declaration was not a mapping.
    #[snafu(display("Service declaration must be a map, got {} instead.", actual))]
    NotAMapping {
        /// JSON type of the value that was given.
        actual: &'static str,
    },

    /// A required identity field was absent or null.
    #[snafu(display("Missing required field '{}'.", field))]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A required identity field was present but empty.
    #[snafu(display("Field '{}' must not be empty.", field))]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A field had the wrong type.
    #[snafu(display("Expected field '{}' to be {}, got {} instead.", field, expected, actual))]
    InvalidFieldType {
        /// Name of the field.
        field: String,

        /// Expected type.
        expected: &'static str,

        /// JSON type of the value that was given.
        actual: &'static str,
    },

    /// The service name cannot be used as a container and image name.
    #[snafu(display(
        "Service name '{}' is invalid: it must start with a lowercase letter or digit and contain only lowercase letters, digits, '_', '.' and '-'.",
        name
    ))]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The image tag cannot be used in an image reference.
    #[snafu(display(
        "Image tag '{}' is invalid: it must be at most 128 characters of letters, digits, '_', '.' and '-', and must not start with '.' or '-'.",
        tag
    ))]
    InvalidImageTag {
        /// The rejected tag.
        tag: String,
    },

    /// A recognized runtime option did not have the expected shape.
    #[snafu(display("Invalid value for runtime option '{}': {}", field, source))]
    InvalidOption {
        /// Name of the runtime option.
        field: &'static str,

        /// Error source.
        source: serde_json::Error,
    },

    /// An environment variable entry was not in `KEY=VALUE` form.
    #[snafu(display("Environment entry '{}' must be in the form 'KEY=VALUE'.", entry))]
    InvalidEnvironmentEntry {
        /// The rejected entry.
        entry: String,
    },

    /// A health check had no test command.
    #[snafu(display("Health check 'tests' must contain at least one entry."))]
    EmptyHealthcheck,

    /// Two declarations in the same batch share a name.
    #[snafu(display(
        "Service name '{}' is declared more than once (first at declaration #{}).",
        name,
        first_index
    ))]
    DuplicateName {
        /// The duplicated name.
        name: String,

        /// Position of the first declaration using this name.
        first_index: usize,
    },
}

/// Normalizing a single declaration failed.
#[derive(Debug, Snafu)]
pub enum NormalizeError {
    /// The declaration failed validation.
    #[snafu(transparent)]
    Validation {
        /// Error source.
        source: ValidationError,
    },

    /// A size field could not be converted to a byte count.
    #[snafu(display("Invalid value for '{}': {}", field, source))]
    Format {
        /// Name of the field holding the size.
        field: &'static str,

        /// Error source.
        source: FormatError,
    },
}

impl NormalizeError {
    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation { source } => Some(source),
            Self::Format { .. } => None,
        }
    }

    /// Returns the size format error, if this is one.
    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            Self::Format { source, .. } => Some(source),
            Self::Validation { .. } => None,
        }
    }
}

/// One failed declaration within a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the declaration in the batch.
    pub index: usize,

    /// Name of the service, if the declaration had a usable one.
    pub name: Option<String>,

    /// Why the declaration was rejected.
    pub error: NormalizeError,
}

/// One or more declarations in a batch were rejected.
///
/// Every declaration is checked before this is returned, so it lists all failures rather than only the first.
#[derive(Debug, Snafu)]
#[snafu(display("{}", render_failures(failures, *total)))]
pub struct BatchError {
    failures: Vec<BatchFailure>,
    total: usize,
}

impl BatchError {
    pub(crate) fn new(failures: Vec<BatchFailure>, total: usize) -> Self {
        Self { failures, total }
    }

    /// Returns the individual failures, in declaration order.
    pub fn failures(&self) -> &[BatchFailure] {
        &self.failures
    }

    /// Returns the number of declarations in the batch.
    pub fn total(&self) -> usize {
        self.total
    }
}

fn render_failures(failures: &[BatchFailure], total: usize) -> String {
    let mut rendered = format!("{} of {} service declaration(s) rejected", failures.len(), total);
    for failure in failures {
        let _ = match &failure.name {
            Some(name) => write!(rendered, "; #{} ({}): {}", failure.index, name, failure.error),
            None => write!(rendered, "; #{}: {}", failure.index, failure.error),
        };
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_error_lists_every_failure() {
        let error = BatchError::new(
            vec![
                BatchFailure {
                    index: 0,
                    name: None,
                    error: ValidationError::MissingField { field: "name" }.into(),
                },
                BatchFailure {
                    index: 3,
                    name: Some("redis".to_string()),
                    error: ValidationError::DuplicateName {
                        name: "redis".to_string(),
                        first_index: 1,
                    }
                    .into(),
                },
            ],
            4,
        );

        let message = error.to_string();
        assert!(message.starts_with("2 of 4 service declaration(s) rejected; #0: "), "{}", message);
        assert!(message.contains("; #3 (redis): "), "{}", message);

        let error: Box<dyn std::error::Error> = Box::new(error);
        assert!(error.source().is_none());
    }
}
