//! Container runtime options.
//!
//! Everything in a declaration other than the identity fields ends up here. Keys the container runtime is known to
//! accept are parsed into typed fields and validated; anything else is carried verbatim in [`RuntimeOptions::extra`].

use std::collections::BTreeMap;

use bytesize::ByteSize;
use serde::{de::DeserializeOwned, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    errors::{NormalizeError, ValidationError},
    size::memory_from_value,
};

/// A port published from the container to the host.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PortMapping {
    /// Port inside the container.
    pub internal: u16,

    /// Port on the host. When absent, the runtime picks one.
    pub external: Option<u16>,

    /// Host address to bind to.
    pub ip: Option<String>,

    /// Transport protocol. The runtime defaults to TCP.
    pub protocol: Option<Protocol>,
}

/// Transport protocol of a published port.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    Tcp,

    /// UDP.
    Udp,
}

/// A host path or named volume mounted into the container.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeMount {
    /// Path on the host to bind-mount.
    pub host_path: Option<String>,

    /// Mount point inside the container.
    pub container_path: String,

    /// Named volume to mount instead of a host path.
    pub volume_name: Option<String>,

    /// Whether the mount is read-only.
    pub read_only: Option<bool>,
}

/// When the runtime restarts a stopped container.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    /// Never restart.
    No,

    /// Restart only after a non-zero exit.
    OnFailure,

    /// Always restart.
    Always,

    /// Always restart, unless the container was stopped explicitly.
    UnlessStopped,
}

/// A container health check.
///
/// Durations are kept as strings (`30s`, `1m30s`) in the form the runtime expects them.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Healthcheck {
    /// Test command, such as `["CMD", "curl", "-f", "http://localhost"]`.
    pub tests: Vec<String>,

    /// Time between checks.
    pub interval: Option<String>,

    /// Time after which a single check is considered failed.
    pub timeout: Option<String>,

    /// Grace period after start during which failures are not counted.
    pub start_period: Option<String>,

    /// Consecutive failures before the container is unhealthy.
    pub retries: Option<u32>,
}

/// Pass-through container runtime options of a service.
///
/// Never contains the identity fields (`name`, `image_tag`, `keep_locally`) and never holds null values.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RuntimeOptions {
    ports: Option<Vec<PortMapping>>,
    envs: Option<Vec<String>>,
    volumes: Option<Vec<VolumeMount>>,
    restart: Option<RestartPolicy>,
    network_mode: Option<String>,
    #[serde(serialize_with = "serialize_byte_count")]
    memory: Option<ByteSize>,
    cpu_shares: Option<u64>,
    healthcheck: Option<Healthcheck>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl RuntimeOptions {
    /// Builds runtime options from the non-identity fields of a declaration.
    ///
    /// Null values are dropped. Recognized keys are validated against their expected shapes, and `memory` is converted
    /// to a byte count.
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Result<Self, NormalizeError> {
        let mut options = Self::default();

        for (key, value) in fields {
            if value.is_null() {
                continue;
            }

            match key.as_str() {
                "ports" => options.ports = Some(parse_option("ports", value)?),
                "envs" => {
                    let envs: Vec<String> = parse_option("envs", value)?;
                    if let Some(entry) = envs.iter().find(|entry| !is_env_entry(entry)) {
                        return Err(ValidationError::InvalidEnvironmentEntry { entry: entry.clone() }.into());
                    }
                    options.envs = Some(envs);
                }
                "volumes" => options.volumes = Some(parse_option("volumes", value)?),
                "restart" => options.restart = Some(parse_option("restart", value)?),
                "network_mode" => options.network_mode = Some(parse_option("network_mode", value)?),
                "memory" => {
                    let bytes = memory_from_value(&value)
                        .map_err(|source| NormalizeError::Format { field: "memory", source })?;
                    options.memory = Some(bytes);
                }
                "cpu_shares" => options.cpu_shares = Some(parse_option("cpu_shares", value)?),
                "healthcheck" => {
                    let healthcheck: Healthcheck = parse_option("healthcheck", value)?;
                    if healthcheck.tests.is_empty() {
                        return Err(ValidationError::EmptyHealthcheck.into());
                    }
                    options.healthcheck = Some(healthcheck);
                }
                _ => {
                    options.extra.insert(key, value);
                }
            }
        }

        Ok(options)
    }

    /// Published ports, in declaration order.
    pub fn ports(&self) -> Option<&[PortMapping]> {
        self.ports.as_deref()
    }

    /// Environment variables, as `KEY=VALUE` entries.
    pub fn envs(&self) -> Option<&[String]> {
        self.envs.as_deref()
    }

    /// Volume mounts.
    pub fn volumes(&self) -> Option<&[VolumeMount]> {
        self.volumes.as_deref()
    }

    /// Restart policy.
    pub fn restart(&self) -> Option<RestartPolicy> {
        self.restart
    }

    /// Network mode, such as `bridge` or `host`.
    pub fn network_mode(&self) -> Option<&str> {
        self.network_mode.as_deref()
    }

    /// Memory limit.
    pub fn memory(&self) -> Option<ByteSize> {
        self.memory
    }

    /// Relative CPU share weight.
    pub fn cpu_shares(&self) -> Option<u64> {
        self.cpu_shares
    }

    /// Health check.
    pub fn healthcheck(&self) -> Option<&Healthcheck> {
        self.healthcheck.as_ref()
    }

    /// Options that are passed through to the runtime without validation.
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// Returns `true` if an option with the given key is set.
    pub fn contains_key(&self, key: &str) -> bool {
        match key {
            "ports" => self.ports.is_some(),
            "envs" => self.envs.is_some(),
            "volumes" => self.volumes.is_some(),
            "restart" => self.restart.is_some(),
            "network_mode" => self.network_mode.is_some(),
            "memory" => self.memory.is_some(),
            "cpu_shares" => self.cpu_shares.is_some(),
            "healthcheck" => self.healthcheck.is_some(),
            other => self.extra.contains_key(other),
        }
    }

    /// Returns `true` if no options are set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Renders the options as a flat map, the shape the provisioning call accepts.
    ///
    /// `memory` is rendered as an integer byte count.
    pub fn to_map(&self) -> Map<String, Value> {
        // All keys are strings and all values are plain data, so serialization cannot fail.
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn parse_option<T>(field: &'static str, value: Value) -> Result<T, ValidationError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|source| ValidationError::InvalidOption { field, source })
}

fn is_env_entry(entry: &str) -> bool {
    matches!(entry.split_once('='), Some((key, _)) if !key.is_empty())
}

fn serialize_byte_count<S>(value: &Option<ByteSize>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(bytes) => serializer.serialize_u64(bytes.as_u64()),
        None => serializer.serialize_none(),
    }
}
