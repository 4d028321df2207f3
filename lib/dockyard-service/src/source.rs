//! Configuration sources.
//!
//! A source yields raw service declarations. Several sources are usually combined: the built-in catalog, plus any
//! services declared in the configuration file.

use dockyard_config::GenericConfiguration;
use dockyard_error::{ErrorContext as _, GenericError};
use serde_json::Value;
use tracing::debug;

use crate::declaration::RawDeclaration;

/// A source of raw service declarations.
pub trait ConfigSource {
    /// Name of this source, used in logs and error messages.
    fn name(&self) -> &str;

    /// Produces the declarations from this source.
    ///
    /// # Errors
    ///
    /// If the declarations could not be read, an error is returned.
    fn declarations(&self) -> Result<Vec<RawDeclaration>, GenericError>;
}

/// A source backed by a fixed list of declarations.
#[derive(Clone, Debug)]
pub struct StaticSource {
    name: String,
    declarations: Vec<RawDeclaration>,
}

impl StaticSource {
    /// Creates a new `StaticSource` with the given name and declarations.
    pub fn new<N>(name: N, declarations: Vec<RawDeclaration>) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            declarations,
        }
    }
}

impl ConfigSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn declarations(&self) -> Result<Vec<RawDeclaration>, GenericError> {
        Ok(self.declarations.clone())
    }
}

/// A source that reads a list of declarations from loaded configuration.
///
/// The list lives under a single key (`services` by default), for example in YAML:
///
/// ```yaml
/// services:
///   - name: nginx
///     image_tag: latest
///     ports:
///       - internal: 80
///         external: 8080
/// ```
///
/// A missing key yields no declarations.
#[derive(Clone, Debug)]
pub struct ConfigurationSource {
    config: GenericConfiguration,
    key: String,
}

impl ConfigurationSource {
    /// Creates a new `ConfigurationSource` reading from the `services` key.
    pub fn new(config: GenericConfiguration) -> Self {
        Self::with_key(config, "services")
    }

    /// Creates a new `ConfigurationSource` reading from the given key.
    pub fn with_key<K>(config: GenericConfiguration, key: K) -> Self
    where
        K: Into<String>,
    {
        Self {
            config,
            key: key.into(),
        }
    }
}

impl ConfigSource for ConfigurationSource {
    fn name(&self) -> &str {
        &self.key
    }

    fn declarations(&self) -> Result<Vec<RawDeclaration>, GenericError> {
        let values = self
            .config
            .try_get_typed::<Vec<Value>>(&self.key)
            .with_error_context(|| format!("Failed to read service list from `{}`.", self.key))?
            .unwrap_or_default();

        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                RawDeclaration::from_value(value)
                    .with_error_context(|| format!("Invalid entry #{} in `{}`.", index, self.key))
            })
            .collect()
    }
}

/// Collects the declarations of every source, in source order.
///
/// # Errors
///
/// If any source fails to produce its declarations, an error is returned.
pub fn collect_declarations<'a, I>(sources: I) -> Result<Vec<RawDeclaration>, GenericError>
where
    I: IntoIterator<Item = &'a dyn ConfigSource>,
{
    let mut declarations = Vec::new();
    for source in sources {
        let mut from_source = source
            .declarations()
            .with_error_context(|| format!("Failed to load declarations from source '{}'.", source.name()))?;
        debug!(source = source.name(), count = from_source.len(), "Loaded service declarations.");
        declarations.append(&mut from_source);
    }
    Ok(declarations)
}
