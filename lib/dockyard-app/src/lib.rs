//! High-level application primitives.
//!
//! This crate provides the primitives needed to bootstrap the `dockyard` binary before it does any real work, such as
//! initializing logging.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod logging;

/// Common imports.
pub mod prelude {
    pub use super::logging::{fatal_and_exit, initialize_logging, LoggingConfiguration};
}
