//! Configuration for the orbital server.
//!
//! Settings persist to disk as RON, stay readable when sections or fields
//! are missing, can be hot-reloaded, and are overridden from the command line.

mod cli;
mod config;
mod error;

pub use cli::{CliArgs, parse_dilation, parse_gc_delay};
pub use config::{
    CONFIG_FILE_NAME, CatalogConfig, Config, DebugConfig, NetworkConfig, SimulationConfig,
    default_config_dir,
};
pub use error::ConfigError;
