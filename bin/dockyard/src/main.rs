//! Dockyard command-line entry point.
//!
//! Loads configuration, gathers service declarations from the built-in catalog and the configuration file, normalizes
//! them, and either prints the resulting plan or hands it to the provisioner.

#![deny(warnings)]
#![deny(missing_docs)]

use std::path::{Path, PathBuf};

use clap::Parser as _;
use dockyard_app::prelude::*;
use dockyard_config::{ConfigurationLoader, GenericConfiguration};
use dockyard_error::{error_chain, ErrorContext as _, GenericError};
use dockyard_service::{
    catalog::{local_services, remote_services, CatalogSettings},
    collect_declarations, normalize_batch, provision_all, ConfigSource, ConfigurationSource, DryRunProvisioner,
    RuntimeOptions, ServiceSpec,
};
use serde::Serialize;
use tracing::{error, info};

mod config;
use self::config::{Action, Cli, OutputFormat};

const DEFAULT_CONFIG_FILE: &str = "./dockyard.yaml";
const ENV_PREFIX: &str = "DOCKYARD";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let configuration = match load_configuration(cli.config_file.as_deref()) {
        Ok(configuration) => configuration,
        Err(e) => fatal_and_exit(format!("failed to load configuration: {}", error_chain(&e))),
    };

    let logging_config = match LoggingConfiguration::from_configuration(&configuration) {
        Ok(logging_config) => logging_config,
        Err(e) => fatal_and_exit(format!("invalid logging configuration: {}", error_chain(&e))),
    };

    if let Err(e) = initialize_logging(&logging_config) {
        fatal_and_exit(format!("failed to initialize logging: {}", error_chain(&e)));
    }

    if let Err(e) = run(cli, configuration).await {
        error!("{}", error_chain(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, configuration: GenericConfiguration) -> Result<(), GenericError> {
    let specs = load_specs(&configuration, !cli.no_builtin)?;
    info!(services = specs.len(), "Normalized service declarations.");

    match cli.action {
        Action::Plan(config) => {
            let plan = specs.iter().map(PlanEntry::from).collect::<Vec<_>>();
            println!("{}", render(&plan, config.format)?);
        }
        Action::Apply(config) => {
            let outputs = provision_all(&DryRunProvisioner, specs).await?;
            info!(outputs = outputs.len(), "Provisioning complete.");
            println!("{}", render(&outputs, config.format)?);
        }
    }

    Ok(())
}

fn load_configuration(config_file: Option<&Path>) -> Result<GenericConfiguration, GenericError> {
    let loader = match config_file {
        Some(path) => ConfigurationLoader::default()
            .from_file(path)
            .with_error_context(|| format!("Failed to load configuration file '{}'.", path.display()))?,
        None => ConfigurationLoader::default().try_from_yaml(PathBuf::from(DEFAULT_CONFIG_FILE)),
    };

    Ok(loader.from_environment(ENV_PREFIX)?.into_generic())
}

fn load_specs(configuration: &GenericConfiguration, with_builtin: bool) -> Result<Vec<ServiceSpec>, GenericError> {
    let catalog = if with_builtin {
        let settings = CatalogSettings::from_configuration(configuration)?;
        Some((local_services(&settings), remote_services(&settings)))
    } else {
        None
    };
    let configured = ConfigurationSource::new(configuration.clone());

    let mut sources: Vec<&dyn ConfigSource> = Vec::new();
    if let Some((local, remote)) = &catalog {
        sources.push(local);
        sources.push(remote);
    }
    sources.push(&configured);

    let declarations = collect_declarations(sources)?;
    let specs = normalize_batch(declarations)?;
    Ok(specs)
}

/// One service in the printed plan.
#[derive(Serialize)]
struct PlanEntry<'a> {
    name: &'a str,
    image_name: String,
    container_name: String,
    keep_locally: bool,
    runtime_options: &'a RuntimeOptions,
}

impl<'a> From<&'a ServiceSpec> for PlanEntry<'a> {
    fn from(spec: &'a ServiceSpec) -> Self {
        Self {
            name: spec.name(),
            image_name: spec.image_name(),
            container_name: spec.container_name(),
            keep_locally: spec.keep_locally(),
            runtime_options: spec.runtime_options(),
        }
    }
}

fn render<T>(value: &T, format: OutputFormat) -> Result<String, GenericError>
where
    T: Serialize,
{
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    Ok(rendered)
}
