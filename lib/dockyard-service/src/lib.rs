//! Service declarations and their normalization.
//!
//! A service is declared as a loosely-typed map ([`RawDeclaration`]) coming from a [`ConfigSource`]. Normalization
//! lifts the identity fields (`name`, `image_tag`, `keep_locally`) out of the map, validates and converts the known
//! container runtime options, and produces a [`ServiceSpec`]. Specs are then handed to a [`Provisioner`], which
//! creates one container workload per service and records the created container names in [`Outputs`].
#![deny(warnings)]
#![deny(missing_docs)]

mod batch;
pub use self::batch::normalize_batch;

pub mod catalog;

mod declaration;
pub use self::declaration::RawDeclaration;

pub mod errors;

mod options;
pub use self::options::{Healthcheck, PortMapping, Protocol, RestartPolicy, RuntimeOptions, VolumeMount};

pub mod provision;
pub use self::provision::{provision_all, DryRunProvisioner, Outputs, Provisioner};

mod size;
pub use self::size::{memory_from_value, parse_size, parse_size_value, FormatError};

mod source;
pub use self::source::{collect_declarations, ConfigSource, ConfigurationSource, StaticSource};

mod spec;
pub use self::spec::{normalize, ServiceSpec};
