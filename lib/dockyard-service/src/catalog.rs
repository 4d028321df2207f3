//! Built-in service catalog.
//!
//! Dockyard ships with two groups of services: local ones (web server and cache) and remote ones (document store).
//! Their credentials and published ports come from configuration, so they can be overridden with `DOCKYARD_*`
//! environment variables, but every setting has a usable default.

use dockyard_config::{deser::PermissiveString, GenericConfiguration};
use dockyard_error::{ErrorContext as _, GenericError};
use serde::Deserialize;
use serde_json::json;
use serde_with::serde_as;

use crate::{declaration::RawDeclaration, source::StaticSource};

const fn default_nginx_port() -> u16 {
    8080
}

fn default_redis_password() -> String {
    "secret".to_string()
}

fn default_redis_data_dir() -> String {
    "/tmp/redis-data".to_string()
}

fn default_mongo_username() -> String {
    "user".to_string()
}

fn default_mongo_password() -> String {
    "pass".to_string()
}

/// Settings used to fill in the built-in service declarations.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CatalogSettings {
    #[serde(default = "default_nginx_port")]
    nginx_port: u16,

    #[serde_as(as = "PermissiveString")]
    #[serde(default = "default_redis_password")]
    redis_password: String,

    #[serde_as(as = "PermissiveString")]
    #[serde(default = "default_redis_data_dir")]
    redis_data_dir: String,

    #[serde_as(as = "PermissiveString")]
    #[serde(default = "default_mongo_username")]
    mongo_username: String,

    #[serde_as(as = "PermissiveString")]
    #[serde(default = "default_mongo_password")]
    mongo_password: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            nginx_port: default_nginx_port(),
            redis_password: default_redis_password(),
            redis_data_dir: default_redis_data_dir(),
            mongo_username: default_mongo_username(),
            mongo_password: default_mongo_password(),
        }
    }
}

impl CatalogSettings {
    /// Reads catalog settings from the given configuration.
    ///
    /// Recognized keys are `nginx_port`, `redis_password`, `redis_data_dir`, `mongo_username` and `mongo_password`.
    /// Missing keys fall back to their defaults. String settings also accept numbers and booleans, which is what
    /// all-digit or `true`/`false` values set through the environment are parsed into.
    ///
    /// # Errors
    ///
    /// If a key is present but has the wrong type, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        config
            .as_typed()
            .error_context("Invalid built-in catalog settings.")
    }
}

/// Services meant to run on the local machine: `nginx` and `redis`.
pub fn local_services(settings: &CatalogSettings) -> StaticSource {
    let nginx = json!({
        "name": "nginx",
        "image_tag": "latest",
        "keep_locally": true,
        "ports": [{ "internal": 80, "external": settings.nginx_port }],
        "restart": "unless-stopped"
    });

    let redis = json!({
        "name": "redis",
        "image_tag": "7.4.1-bookworm",
        "ports": [{ "internal": 6379, "external": 6379 }],
        "restart": "unless-stopped",
        "envs": [format!("REDIS_PASSWORD={}", settings.redis_password)],
        "volumes": [{ "host_path": settings.redis_data_dir, "container_path": "/data" }]
    });

    StaticSource::new("local", vec![into_declaration(nginx), into_declaration(redis)])
}

/// Services meant to run on a remote host: `mongo`.
pub fn remote_services(settings: &CatalogSettings) -> StaticSource {
    let mongo = json!({
        "name": "mongo",
        "image_tag": "8.0.3-noble",
        "ports": [{ "internal": 27017, "external": 27017 }],
        "restart": "unless-stopped",
        "envs": [
            format!("MONGO_INITDB_ROOT_USERNAME={}", settings.mongo_username),
            format!("MONGO_INITDB_ROOT_PASSWORD={}", settings.mongo_password)
        ],
        "network_mode": "bridge",
        "memory": "512m",
        "cpu_shares": 512,
        "healthcheck": {
            "tests": ["CMD", "mongosh", "--eval", "db.adminCommand('ping')"],
            "interval": "30s",
            "timeout": "10s",
            "retries": 3
        }
    });

    StaticSource::new("remote", vec![into_declaration(mongo)])
}

fn into_declaration(value: serde_json::Value) -> RawDeclaration {
    match value {
        serde_json::Value::Object(map) => RawDeclaration::from(map),
        _ => RawDeclaration::new(),
    }
}

#[cfg(test)]
mod tests {
    use bytesize::ByteSize;
    use dockyard_config::ConfigurationLoader;

    use super::*;
    use crate::{batch::normalize_batch, options::RestartPolicy, source::ConfigSource as _};

    fn catalog(settings: &CatalogSettings) -> Vec<RawDeclaration> {
        let mut declarations = local_services(settings).declarations().unwrap();
        declarations.extend(remote_services(settings).declarations().unwrap());
        declarations
    }

    #[test]
    fn catalog_normalizes_cleanly() {
        let specs = normalize_batch(catalog(&CatalogSettings::default())).unwrap();
        let images = specs.iter().map(|spec| spec.image_name()).collect::<Vec<_>>();
        assert_eq!(images, ["nginx:latest", "redis:7.4.1-bookworm", "mongo:8.0.3-noble"]);

        let mongo = &specs[2];
        assert_eq!(mongo.container_name(), "my-mongo");
        assert_eq!(mongo.runtime_options().memory(), Some(ByteSize::mib(512)));
        assert_eq!(mongo.runtime_options().cpu_shares(), Some(512));
        assert_eq!(mongo.runtime_options().restart(), Some(RestartPolicy::UnlessStopped));
        assert_eq!(
            mongo.runtime_options().envs().unwrap(),
            ["MONGO_INITDB_ROOT_USERNAME=user", "MONGO_INITDB_ROOT_PASSWORD=pass"]
        );
    }

    #[test]
    fn settings_come_from_configuration() {
        let config = ConfigurationLoader::default()
            .with_defaults(json!({ "redis_password": "hunter2", "nginx_port": 9090 }))
            .into_generic();
        let settings = CatalogSettings::from_configuration(&config).unwrap();
        assert_eq!(settings.redis_password, "hunter2");
        assert_eq!(settings.nginx_port, 9090);
        assert_eq!(settings.mongo_username, "user");

        let specs = normalize_batch(local_services(&settings).declarations().unwrap()).unwrap();
        assert_eq!(specs[0].runtime_options().ports().unwrap()[0].external, Some(9090));
        assert_eq!(specs[1].runtime_options().envs().unwrap(), ["REDIS_PASSWORD=hunter2"]);
    }

    #[test]
    fn wrongly_typed_settings_are_errors() {
        let config = ConfigurationLoader::default()
            .with_defaults(json!({ "nginx_port": "not-a-port" }))
            .into_generic();
        assert!(CatalogSettings::from_configuration(&config).is_err());
    }

    #[test]
    fn scalar_credentials_from_environment() {
        std::env::set_var("DOCKYARDCATALOGTEST_REDIS_PASSWORD", "123456");
        std::env::set_var("DOCKYARDCATALOGTEST_MONGO_PASSWORD", "true");
        std::env::set_var("DOCKYARDCATALOGTEST_NGINX_PORT", "9443");

        let config = ConfigurationLoader::default()
            .from_environment("dockyardcatalogtest")
            .unwrap()
            .into_generic();
        let settings = CatalogSettings::from_configuration(&config).unwrap();
        assert_eq!(settings.redis_password, "123456");
        assert_eq!(settings.mongo_password, "true");
        assert_eq!(settings.mongo_username, "user");
        assert_eq!(settings.nginx_port, 9443);

        let specs = normalize_batch(catalog(&settings)).unwrap();
        assert_eq!(specs[1].runtime_options().envs().unwrap(), ["REDIS_PASSWORD=123456"]);
        assert_eq!(
            specs[2].runtime_options().envs().unwrap(),
            ["MONGO_INITDB_ROOT_USERNAME=user", "MONGO_INITDB_ROOT_PASSWORD=true"]
        );
    }
}
