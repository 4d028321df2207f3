//! Workload provisioning.
//!
//! Normalized specs are handed to a [`Provisioner`], which pulls the image and creates a container for each of them.
//! The name of every created container is recorded in [`Outputs`] under the spec's output key.

use async_trait::async_trait;
use dockyard_error::{ErrorContext as _, GenericError};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::{options::RuntimeOptions, spec::ServiceSpec};

/// A request to create one container workload.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadRequest {
    /// Name of the container to create.
    pub container_name: String,

    /// Full image reference to pull.
    pub image_name: String,

    /// Whether the pulled image is kept after the workload is removed.
    pub keep_locally: bool,

    /// Options passed through to the container runtime.
    pub runtime_options: RuntimeOptions,
}

impl From<ServiceSpec> for WorkloadRequest {
    fn from(spec: ServiceSpec) -> Self {
        let container_name = spec.container_name();
        let image_name = spec.image_name();
        let (_, _, keep_locally, runtime_options) = spec.into_parts();

        Self {
            container_name,
            image_name,
            keep_locally,
            runtime_options,
        }
    }
}

/// Handles to a created workload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkloadHandles {
    /// Identifier of the pulled image.
    pub image_id: String,

    /// Name of the created container.
    pub container_name: String,
}

/// A container runtime capable of creating workloads.
#[async_trait]
pub trait Provisioner {
    /// Pulls the requested image and creates a container from it.
    ///
    /// # Errors
    ///
    /// If the image cannot be pulled or the container cannot be created, an error is returned.
    async fn create_workload(&self, request: WorkloadRequest) -> Result<WorkloadHandles, GenericError>;
}

/// A provisioner that only logs what it would create.
#[derive(Clone, Copy, Debug, Default)]
pub struct DryRunProvisioner;

#[async_trait]
impl Provisioner for DryRunProvisioner {
    async fn create_workload(&self, request: WorkloadRequest) -> Result<WorkloadHandles, GenericError> {
        info!(
            image = %request.image_name,
            container = %request.container_name,
            keep_locally = request.keep_locally,
            options = request.runtime_options.to_map().len(),
            "Would create workload."
        );

        Ok(WorkloadHandles {
            image_id: request.image_name,
            container_name: request.container_name,
        })
    }
}

/// Values exported after provisioning, in provisioning order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Outputs(IndexMap<String, String>);

impl Outputs {
    /// Records an output value, replacing any previous value for the same key.
    pub fn record<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value recorded for `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over all outputs in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of recorded outputs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Provisions every spec, in order, with the given provisioner.
///
/// # Errors
///
/// If any workload fails to be created, provisioning stops and the error is returned. Workloads created before the
/// failure are left in place.
pub async fn provision_all<P>(provisioner: &P, specs: Vec<ServiceSpec>) -> Result<Outputs, GenericError>
where
    P: Provisioner + ?Sized,
{
    let mut outputs = Outputs::default();
    for spec in specs {
        let output_key = spec.output_key();
        let name = spec.name().to_string();

        let handles = provisioner
            .create_workload(WorkloadRequest::from(spec))
            .await
            .with_error_context(|| format!("Failed to provision service '{}'.", name))?;

        debug!(service = %name, image_id = %handles.image_id, "Provisioned service.");
        outputs.record(output_key, handles.container_name);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use dockyard_error::generic_error;
    use serde_json::json;

    use super::*;
    use crate::{batch::normalize_batch, declaration::RawDeclaration};

    fn specs(values: Vec<serde_json::Value>) -> Vec<ServiceSpec> {
        normalize_batch(
            values
                .into_iter()
                .map(|value| RawDeclaration::from_value(value).unwrap()),
        )
        .unwrap()
    }

    #[derive(Default)]
    struct RecordingProvisioner {
        requests: Mutex<Vec<WorkloadRequest>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Provisioner for RecordingProvisioner {
        async fn create_workload(&self, request: WorkloadRequest) -> Result<WorkloadHandles, GenericError> {
            if Some(request.container_name.as_str()) == self.fail_on {
                return Err(generic_error!("Image not found."));
            }

            let handles = WorkloadHandles {
                image_id: format!("sha256:{}", request.image_name),
                container_name: request.container_name.clone(),
            };
            self.requests.lock().unwrap().push(request);
            Ok(handles)
        }
    }

    #[test]
    fn request_from_spec() {
        let spec = specs(vec![json!({
            "name": "mongo",
            "image_tag": "8.0.3-noble",
            "keep_locally": false,
            "memory": "512m"
        })])
        .remove(0);

        let request = WorkloadRequest::from(spec);
        assert_eq!(request.container_name, "my-mongo");
        assert_eq!(request.image_name, "mongo:8.0.3-noble");
        assert!(!request.keep_locally);
        assert_eq!(request.runtime_options.to_map().get("memory"), Some(&json!(536_870_912u64)));
    }

    #[tokio::test]
    async fn outputs_follow_provisioning_order() {
        let provisioner = RecordingProvisioner::default();
        let outputs = provision_all(
            &provisioner,
            specs(vec![
                json!({ "name": "nginx", "image_tag": "latest" }),
                json!({ "name": "redis", "image_tag": "7.4.1-bookworm" }),
            ]),
        )
        .await
        .unwrap();

        let recorded = outputs.iter().collect::<Vec<_>>();
        assert_eq!(
            recorded,
            [
                ("nginx_container_name", "my-nginx"),
                ("redis_container_name", "my-redis")
            ]
        );
        assert_eq!(provisioner.requests.lock().unwrap().len(), 2);
        assert_eq!(
            serde_json::to_value(&outputs).unwrap(),
            json!({ "nginx_container_name": "my-nginx", "redis_container_name": "my-redis" })
        );
    }

    #[tokio::test]
    async fn provisioning_stops_at_first_failure() {
        let provisioner = RecordingProvisioner {
            fail_on: Some("my-redis"),
            ..Default::default()
        };
        let error = provision_all(
            &provisioner,
            specs(vec![
                json!({ "name": "nginx", "image_tag": "latest" }),
                json!({ "name": "redis", "image_tag": "7" }),
                json!({ "name": "mongo", "image_tag": "8" }),
            ]),
        )
        .await
        .unwrap_err();

        assert_eq!(error.to_string(), "Failed to provision service 'redis'.");
        assert_eq!(provisioner.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_echoes_names() {
        let provisioner: &dyn Provisioner = &DryRunProvisioner;
        let outputs = provision_all(provisioner, specs(vec![json!({ "name": "mongo", "image_tag": "8" })]))
            .await
            .unwrap();
        assert_eq!(outputs.get("mongo_container_name"), Some("my-mongo"));
        assert_eq!(outputs.len(), 1);
    }
}
