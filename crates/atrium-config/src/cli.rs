//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::config::default_config_dir;
use crate::error::ConfigError;
use crate::Config;

/// Atrium command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "atrium", about = "Atrium presence service")]
pub struct CliArgs {
    /// Address to bind (server) or dial (client).
    #[arg(long)]
    pub listen: Option<String>,

    /// Server port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Environment key to propose at join.
    #[arg(long)]
    pub env: Option<String>,

    /// Display name for the local player.
    #[arg(long)]
    pub name: Option<String>,

    /// Directory for the JSON log file.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    /// Directory to load `config.ron` from: the `--config` override, or
    /// the platform config directory.
    pub fn resolve_config_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.config {
            Some(dir) => Ok(dir.clone()),
            None => default_config_dir().ok_or(ConfigError::NoConfigDir),
        }
    }
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.listen {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(ref env) = args.env {
            self.player.env_key = env.clone();
        }
        if let Some(ref name) = args.name {
            self.player.name = name.clone();
        }
        if let Some(ref dir) = args.log_dir {
            self.log.dir = Some(dir.clone());
        }
        match args.verbose {
            0 => {}
            1 => self.log.level = "debug".to_string(),
            _ => self.log.level = "trace".to_string(),
        }
    }
}
