//! Normalized service specs.
//!
//! [`normalize`] turns one raw declaration into a [`ServiceSpec`], the form every later stage works with.

use std::sync::LazyLock;

use dockyard_config::deser::PermissiveBool;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use serde_with::DeserializeAs as _;

use crate::{
    declaration::RawDeclaration,
    errors::{NormalizeError, ValidationError},
    options::RuntimeOptions,
    size::json_type_name,
};

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").unwrap());
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap());

/// The normalized form of one service declaration.
///
/// Identity (`name`, `image_tag`, `keep_locally`) is held in dedicated fields, and everything else lives in
/// [`RuntimeOptions`]. A `ServiceSpec` can only be built through [`normalize`], so its invariants always hold.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceSpec {
    name: String,
    image_tag: String,
    keep_locally: bool,
    runtime_options: RuntimeOptions,
}

impl ServiceSpec {
    /// Name of the service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image tag.
    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    /// Whether the pulled image is kept after the workload is removed.
    pub fn keep_locally(&self) -> bool {
        self.keep_locally
    }

    /// Container runtime options.
    pub fn runtime_options(&self) -> &RuntimeOptions {
        &self.runtime_options
    }

    /// Full image reference, `<name>:<image_tag>`.
    pub fn image_name(&self) -> String {
        format!("{}:{}", self.name, self.image_tag)
    }

    /// Name of the container, `my-<name>`.
    pub fn container_name(&self) -> String {
        format!("my-{}", self.name)
    }

    /// Key under which the created container's name is exported, `<name>_container_name`.
    pub fn output_key(&self) -> String {
        format!("{}_container_name", self.name)
    }

    pub(crate) fn into_parts(self) -> (String, String, bool, RuntimeOptions) {
        (self.name, self.image_tag, self.keep_locally, self.runtime_options)
    }
}

/// Normalizes a raw declaration into a [`ServiceSpec`].
///
/// `name` and `image_tag` are required and lifted out of the declaration, as is `keep_locally` (defaulting to `true`).
/// Every other non-null field becomes a runtime option; see [`RuntimeOptions`] for how known options are validated.
///
/// # Errors
///
/// If an identity field is missing, empty, of the wrong type, or unsafe to use in a container or image reference, or
/// if a runtime option is malformed, an error is returned.
pub fn normalize(raw: RawDeclaration) -> Result<ServiceSpec, NormalizeError> {
    let mut fields = raw.into_inner();

    let name = take_identity(&mut fields, "name")?;
    if !NAME_PATTERN.is_match(&name) {
        return Err(ValidationError::InvalidName { name }.into());
    }

    let image_tag = take_identity(&mut fields, "image_tag")?;
    if !TAG_PATTERN.is_match(&image_tag) {
        return Err(ValidationError::InvalidImageTag { tag: image_tag }.into());
    }

    let keep_locally = take_keep_locally(&mut fields)?;
    let runtime_options = RuntimeOptions::from_fields(fields)?;

    Ok(ServiceSpec {
        name,
        image_tag,
        keep_locally,
        runtime_options,
    })
}

fn take_identity(fields: &mut Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField { field }),
        Some(Value::String(value)) if value.is_empty() => Err(ValidationError::EmptyField { field }),
        Some(Value::String(value)) => Ok(value),
        Some(other) => Err(ValidationError::InvalidFieldType {
            field: field.to_string(),
            expected: "a string",
            actual: json_type_name(&other),
        }),
    }
}

fn take_keep_locally(fields: &mut Map<String, Value>) -> Result<bool, ValidationError> {
    match fields.remove("keep_locally") {
        None | Some(Value::Null) => Ok(true),
        Some(value) => {
            let actual = json_type_name(&value);
            PermissiveBool::deserialize_as(value).map_err(|_: serde_json::Error| ValidationError::InvalidFieldType {
                field: "keep_locally".to_string(),
                expected: "a boolean",
                actual,
            })
        }
    }
}
