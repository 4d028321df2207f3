use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Declares container workloads and prepares them for provisioning.
#[derive(Parser)]
#[command(about)]
pub struct Cli {
    /// Path to the configuration file.
    ///
    /// Files ending in `.json` are read as JSON, anything else as YAML. When not given, `./dockyard.yaml` is used if it
    /// exists.
    #[arg(global = true, short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// Skip the built-in service catalog, using only services declared in configuration.
    #[arg(global = true, long)]
    pub no_builtin: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand)]
pub enum Action {
    /// Normalize every declared service and print the resulting specs.
    Plan(PlanConfig),

    /// Provision every declared service and print the exported outputs.
    ///
    /// Provisioning is a dry run: workloads are logged, not created.
    Apply(ApplyConfig),
}

/// Output format of a command.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,

    /// YAML.
    Yaml,
}

/// `plan` configuration.
#[derive(Args, Clone)]
pub struct PlanConfig {
    /// Output format.
    #[arg(short = 'f', long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// `apply` configuration.
#[derive(Args, Clone)]
pub struct ApplyConfig {
    /// Output format.
    #[arg(short = 'f', long, value_enum, default_value_t)]
    pub format: OutputFormat,
}
