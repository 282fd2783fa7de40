//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs` or `std::process`.
//! All functions are synchronous and take data in, returning data out.

pub mod command;
pub mod config;
pub mod error;
pub mod version;

pub use config::{
    AnsibleConfig, ControllerSpec, GalaxySpec, InstallMethod, OptionBag, OptionValue, Playbooks,
    PlaybookRun, PullSpec, Repository, parse_config,
};
pub use error::{ProvisionError, ValidationError, ValidationKind};
pub use version::parse_tool_version;
