//! Application-level error handling.
//!
//! Library crates in this workspace define their own strongly-typed errors with `snafu`. Once those errors cross into
//! application code (the CLI, source loading, provisioning), they are erased into [`GenericError`] and decorated with
//! context as they bubble up.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::{self, Display};

/// A type-erased error with an optional chain of causes.
pub type GenericError = anyhow::Error;

/// Macro for constructing a [`GenericError`].
///
/// Accepts a string literal, a format string with arguments (in the same shape as `std::format!`), or any value which
/// implements `Debug` and `Display`. When the value is an existing `std::error::Error`, its source chain is preserved.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

mod private {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods for attaching context to fallible results.
///
/// This mirrors `anyhow::Context`, but under distinct method names so that it can be imported alongside
/// `snafu::ResultExt` without the two sets of `context` methods colliding.
pub trait ErrorContext<T, E>: private::Sealed {
    /// Wraps the error value with additional context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error value with additional context that is only evaluated if an error occurred.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        <Self as anyhow::Context<T, E>>::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        <Self as anyhow::Context<T, E>>::with_context(self, f)
    }
}

/// Renders an error and all of its causes on a single line.
///
/// Multi-line `{:?}` output of an error chain breaks log formatting, so errors reported through the logger are written
/// as `outer: cause: root cause` instead.
pub fn error_chain(error: &GenericError) -> ErrorChain<'_> {
    ErrorChain { error }
}

/// Single-line display adapter returned by [`error_chain`].
pub struct ErrorChain<'a> {
    error: &'a GenericError,
}

impl Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cause) in self.error.chain().enumerate() {
            if i > 0 {
                f.write_str(": ")?;
            }
            write!(f, "{}", cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_attached() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("disk on fire"));
        let error = result.error_context("Failed to read services file.").unwrap_err();

        assert_eq!(error.to_string(), "Failed to read services file.");
        assert_eq!(error.root_cause().to_string(), "disk on fire");
    }

    #[test]
    fn chain_renders_on_one_line() {
        let result: Result<(), GenericError> = Err(generic_error!("missing field 'name'"));
        let error = result
            .with_error_context(|| format!("Failed to normalize declaration #{}.", 2))
            .unwrap_err();

        assert_eq!(
            error_chain(&error).to_string(),
            "Failed to normalize declaration #2.: missing field 'name'"
        );
    }
}
