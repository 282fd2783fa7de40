//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs` or `std::process`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use semver::Version;
use thiserror::Error;

// ── Validation errors ─────────────────────────────────────────────────────────

/// Category of a configuration violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// A required key is absent or empty.
    MissingKey,
    /// A key is present but holds a value outside the accepted set.
    InvalidValue,
    /// A section has the wrong container type.
    InvalidShape,
    /// Two keys that exclude each other are both set.
    MutuallyExclusive,
}

/// A configuration violation, raised before any external command runs.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Violation category.
    pub kind: ValidationKind,
    /// The offending sub-config, rendered as YAML flow text.
    pub context: String,
    /// Human-readable explanation, including `context`.
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(kind: ValidationKind, context: String, message: String) -> Self {
        Self {
            kind,
            context,
            message,
        }
    }
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Every fatal failure the provisioning workflow can surface.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to install the {package} package: {reason}")]
    Install { package: String, reason: String },

    #[error("command: {0} is not installed")]
    MissingDependency(String),

    #[error("Ansible version {version} doesn't support --{option} flag, exiting.")]
    UnsupportedOption { version: Version, option: String },

    #[error("{command} exited with {}: {stderr}", exit_code_label(*.code))]
    CommandExecution {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

fn exit_code_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}
