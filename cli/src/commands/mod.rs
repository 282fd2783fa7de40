//! Command implementations

pub mod run;
pub mod validate;
pub mod version;

use std::path::PathBuf;

use clap::Args;

/// Environment variable consulted when `--config` is not given.
pub const CONFIG_ENV: &str = "ANSIBLE_BOOTSTRAP_CONFIG";

/// Where to read the cloud-config document from.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Cloud-config YAML document (`-` reads standard input)
    #[arg(short, long, env = CONFIG_ENV, value_name = "PATH")]
    pub config: PathBuf,
}
