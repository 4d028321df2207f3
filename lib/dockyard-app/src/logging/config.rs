use dockyard_config::{deser::PermissiveBool, GenericConfiguration};
use dockyard_error::{generic_error, ErrorContext as _, GenericError};
use serde::Deserialize;
use serde_with::serde_as;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn default_log_level() -> LogLevel {
    LevelFilter::INFO.into()
}

const fn default_false() -> bool {
    false
}

/// Logging configuration.
///
/// Read from the `log_level` and `log_format_json` keys, which can be overridden with `DOCKYARD_LOG_LEVEL` and
/// `DOCKYARD_LOG_FORMAT_JSON`.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct LoggingConfiguration {
    #[serde(default = "default_log_level")]
    log_level: LogLevel,

    #[serde_as(as = "PermissiveBool")]
    #[serde(default = "default_false")]
    log_format_json: bool,
}

impl LoggingConfiguration {
    /// Creates a new `LoggingConfiguration` instance from the given configuration.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be deserialized as `LoggingConfiguration`, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let logging_config = config.as_typed()?;
        Ok(logging_config)
    }

    /// Returns the level filtering directives.
    pub fn env_filter(&self) -> EnvFilter {
        self.log_level.as_env_filter()
    }

    /// Returns `true` if logs should be written as JSON.
    pub fn format_json(&self) -> bool {
        self.log_format_json
    }
}

impl Default for LoggingConfiguration {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format_json: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "String")]
struct LogLevel(String);

impl LogLevel {
    fn as_env_filter(&self) -> EnvFilter {
        EnvFilter::new(&self.0)
    }
}

impl From<LevelFilter> for LogLevel {
    fn from(level: LevelFilter) -> Self {
        Self(level.to_string())
    }
}

impl TryFrom<String> for LogLevel {
    type Error = GenericError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(generic_error!("Log level cannot be empty."));
        }

        EnvFilter::builder()
            .parse(&value)
            .error_context("Failed to parse valid log level.")?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use dockyard_config::ConfigurationLoader;
    use serde_json::json;

    use super::*;

    fn load(value: serde_json::Value) -> Result<LoggingConfiguration, GenericError> {
        let config = ConfigurationLoader::default().with_defaults(value).into_generic();
        LoggingConfiguration::from_configuration(&config)
    }

    #[test]
    fn defaults() {
        let config = load(json!({})).unwrap();
        assert!(!config.format_json());
        assert!(config.env_filter().to_string().contains("info"));
    }

    #[test]
    fn explicit_values() {
        let config = load(json!({ "log_level": "debug,dockyard_service=trace", "log_format_json": "1" })).unwrap();
        assert!(config.format_json());
        assert!(config.env_filter().to_string().contains("dockyard_service=trace"));
    }

    #[test]
    fn empty_level_is_rejected() {
        assert!(load(json!({ "log_level": "" })).is_err());
    }
}
