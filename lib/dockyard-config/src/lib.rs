//! Loading and querying of layered configuration.
//!
//! Service declarations, catalog credentials and logging settings all come through this crate: files and environment
//! variables are merged by [`ConfigurationLoader`] into a [`GenericConfiguration`], which is then queried by key.
#![deny(warnings)]
#![deny(missing_docs)]

use std::{borrow::Cow, collections::HashSet, path::Path, sync::Arc};

use dockyard_error::GenericError;
use figment::{
    error::Kind,
    providers::{Env, Serialized},
    Figment, Provider,
};
pub use figment::value;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

pub mod deser;
mod provider;

use self::provider::ResolvedProvider;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// A configuration file could not be read or parsed.
    #[snafu(display("Failed to load configuration file '{}'.", path))]
    File {
        /// Path of the file that failed to load.
        path: String,

        /// Error source.
        source: figment::Error,
    },

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how to set the missing field, including the environment variable to use when
        /// environment variables were loaded.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field's value did not have the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the invalid field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e.into() },
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum LookupSource {
    /// The key is looked up as an environment variable with the given prefix.
    Environment { prefix: String },
}

impl LookupSource {
    fn transform_key(&self, key: &str) -> String {
        match self {
            // Prefix is already uppercased and carries its trailing underscore.
            LookupSource::Environment { prefix } => format!("{}{}", prefix, key.replace('.', "_").to_uppercase()),
        }
    }
}

struct BoxedProvider(Box<dyn Provider + Send + Sync>);

impl Provider for BoxedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<value::Map<figment::Profile, value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// A configuration loader that pulls from several sources.
///
/// Sources have an implicit priority based on the order in which they are added: sources added later override values
/// from sources added earlier. The merged result is either deserialized directly ([`into_typed`][Self::into_typed]) or
/// wrapped for key-based querying ([`into_generic`][Self::into_generic]).
///
/// # Supported sources
///
/// - serializable defaults (see [`with_defaults`][Self::with_defaults])
/// - YAML file
/// - JSON file
/// - environment variables (must be prefixed; see [`from_environment`][Self::from_environment])
#[derive(Default)]
pub struct ConfigurationLoader {
    lookup_sources: HashSet<LookupSource>,
    providers: Vec<BoxedProvider>,
}

impl ConfigurationLoader {
    /// Adds a set of default values.
    ///
    /// `defaults` must serialize to a map. Sources added afterwards take precedence.
    pub fn with_defaults<T>(mut self, defaults: T) -> Self
    where
        T: Serialize,
    {
        let provider = Serialized::defaults(defaults);
        let data = provider.data();
        match data {
            Ok(data) => {
                self.providers
                    .push(BoxedProvider(Box::new(ResolvedProvider::from_data(data, "defaults"))));
            }
            Err(e) => debug!(error = %e, "Unable to serialize default configuration values. Ignoring."),
        }
        self
    }

    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let resolved_provider = ResolvedProvider::from_yaml(&path).context(File {
            path: path.as_ref().to_string_lossy(),
        })?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable, and not being valid YAML.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<Path>,
    {
        match ResolvedProvider::from_yaml(&path) {
            Ok(resolved_provider) => self.providers.push(BoxedProvider(Box::new(resolved_provider))),
            Err(e) => {
                debug!(error = %e, file_path = %path.as_ref().to_string_lossy(), "Unable to read YAML configuration file. Ignoring.");
            }
        }
        self
    }

    /// Loads the given JSON configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid JSON, an error will be returned.
    pub fn from_json<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let resolved_provider = ResolvedProvider::from_json(&path).context(File {
            path: path.as_ref().to_string_lossy(),
        })?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Loads a configuration file, choosing the format from its extension.
    ///
    /// Files ending in `.json` are read as JSON; everything else is read as YAML.
    ///
    /// # Errors
    ///
    /// If the file could not be read or parsed, an error will be returned.
    pub fn from_file<P>(self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let is_json = path
            .as_ref()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            self.from_json(path)
        } else {
            self.from_yaml(path)
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with one. For example, with a
    /// prefix of `dockyard`, any environment variable starting with `DOCKYARD_` would be matched. The prefix is
    /// case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the environment could not be read, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        // `Env` is not `Send + Sync`, so snapshot its values up front.
        let values = Env::prefixed(&prefix).data()?;
        if let Some(default_dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
            self.lookup_sources.insert(LookupSource::Environment { prefix });
        }
        Ok(self)
    }

    fn figment(&self) -> Figment {
        self.providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider))
    }

    /// Consumes the loader, deserializing the merged configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.figment()
            .extract()
            .map_err(|e| from_figment_error(&self.lookup_sources, e))
    }

    /// Consumes the loader and wraps the merged configuration for key-based querying.
    pub fn into_generic(self) -> GenericConfiguration {
        let figment = self.figment();
        GenericConfiguration {
            inner: Arc::new(Inner {
                figment,
                lookup_sources: self.lookup_sources,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    lookup_sources: HashSet<LookupSource>,
}

/// A generic configuration object.
///
/// This is the merged configuration produced by [`ConfigurationLoader`] in its raw form. Values are queried by key and
/// extracted as typed values.
///
/// Keys must be in the form of `a.b.c`, where periods (`.`) indicate a nested value. Querying `services` from this
/// YAML:
///
/// ```yaml
/// services:
///   - name: nginx
///     image_tag: latest
/// ```
///
/// returns the whole list, while `logging.level` would look up `level` inside a `logging` map.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) => {
                if matches!(e.kind, Kind::MissingField(_)) {
                    // Nested keys that only exist in the environment are flattened with underscores (`redis.password`
                    // arrives as `redis_password`), so retry with that spelling.
                    let fallback_key = key.replace('.', "_");
                    self.inner
                        .figment
                        .extract_inner(&fallback_key)
                        .map_err(|fallback_e| from_figment_error(&self.inner.lookup_sources, fallback_e))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Returns `true` if the given key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.figment.contains(key) || self.inner.figment.contains(&key.replace('.', "_"))
    }

    /// Gets a configuration value by key.
    ///
    /// # Errors
    ///
    /// If the key does not exist, or if the value could not be deserialized into `T`, an error will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets a configuration value by key, or the default value of `T` if the key does not exist or could not be
    /// deserialized.
    ///
    /// This swallows deserialization errors and should be used sparingly.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets a configuration value by key, if it exists.
    ///
    /// # Errors
    ///
    /// If the key exists but the value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Attempts to deserialize the entire configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract()
            .map_err(|e| from_figment_error(&self.inner.lookup_sources, e))
    }
}

fn from_figment_error(lookup_sources: &HashSet<LookupSource>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let mut valid_keys = lookup_sources
                .iter()
                .map(|source| source.transform_key(&field))
                .collect::<Vec<_>>();
            valid_keys.insert(0, field.to_string());

            let help_text = format!("Try setting `{}`.", valid_keys.join("` or `"));

            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use serde_json::json;

    use super::*;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_environment_prefix() {
        let result = ConfigurationLoader::default().from_environment("");
        assert!(matches!(result, Err(ConfigurationError::EmptyPrefix)));
    }

    #[test]
    fn yaml_values_are_queryable() {
        let file = yaml_file("log_level: debug\nservices:\n  - name: nginx\n    image_tag: latest\n");
        let config = ConfigurationLoader::default().from_yaml(file.path()).unwrap().into_generic();

        assert_eq!(config.get_typed::<String>("log_level").unwrap(), "debug");
        let services = config.get_typed::<serde_json::Value>("services").unwrap();
        assert_eq!(services, json!([{ "name": "nginx", "image_tag": "latest" }]));
    }

    #[test]
    fn missing_yaml_file_is_an_error() {
        let result = ConfigurationLoader::default().from_yaml("/nonexistent/dockyard.yaml");
        assert!(matches!(result, Err(ConfigurationError::File { .. })));

        // ...unless loaded optimistically.
        let config = ConfigurationLoader::default()
            .try_from_yaml("/nonexistent/dockyard.yaml")
            .into_generic();
        assert!(!config.contains("services"));
    }

    #[test]
    fn later_sources_take_precedence() {
        let file = yaml_file("redis_password: from-file\n");
        let config = ConfigurationLoader::default()
            .with_defaults(json!({ "redis_password": "secret", "mongo_username": "user" }))
            .from_yaml(file.path())
            .unwrap()
            .into_generic();

        assert_eq!(config.get_typed::<String>("redis_password").unwrap(), "from-file");
        assert_eq!(config.get_typed::<String>("mongo_username").unwrap(), "user");
    }

    #[test]
    fn environment_overrides_and_help_text() {
        std::env::set_var("DOCKYARDCFGTEST_MONGO_PASSWORD", "hunter2");

        let config = ConfigurationLoader::default()
            .with_defaults(json!({ "mongo_password": "pass" }))
            .from_environment("dockyardcfgtest")
            .unwrap()
            .into_generic();

        assert_eq!(config.get_typed::<String>("mongo_password").unwrap(), "hunter2");
        assert_eq!(config.try_get_typed::<String>("not_there").unwrap(), None);

        match config.get_typed::<String>("not_there") {
            Err(ConfigurationError::MissingField { help_text, .. }) => {
                assert_eq!(help_text, "Try setting `not_there` or `DOCKYARDCFGTEST_NOT_THERE`.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn invalid_type_is_reported() {
        let config = ConfigurationLoader::default()
            .with_defaults(json!({ "log_level": ["not", "a", "string"] }))
            .into_generic();

        assert!(matches!(
            config.get_typed::<String>("log_level"),
            Err(ConfigurationError::InvalidFieldType { .. })
        ));
        assert_eq!(config.get_typed_or_default::<String>("log_level"), "");
    }
}
