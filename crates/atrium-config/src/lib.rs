//! Configuration for the Atrium presence service.
//!
//! Settings persist to disk as a RON file with serde defaults, so old
//! config files keep loading as fields are added. CLI flags parsed with
//! clap override the file; `--config` relocates the whole directory.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, LogConfig, NetworkConfig, PlayerConfig, default_config_dir};
pub use error::ConfigError;
