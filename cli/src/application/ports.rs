//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::Output;

use anyhow::Result;

// ── Value Types ───────────────────────────────────────────────────────────────

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute, resolved on `PATH` by the runner.
    pub program: String,
    /// Arguments, passed verbatim (no shell).
    pub args: Vec<String>,
    /// Variables added to (or overriding) the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory; inherited when `None`.
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Invocation with no environment overlay and the inherited working directory.
    #[must_use]
    pub fn new<S: AsRef<str>>(program: &str, args: &[S]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            env: Vec::new(),
            cwd: None,
        }
    }

    /// Shell-style rendering for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            let mut all = vec![self.program.clone()];
            all.extend(self.args.iter().cloned());
            all.join(" ")
        })
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run the invocation to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error only when the process cannot be spawned or waited
    /// on (or exceeds a configured timeout). A non-zero exit status is
    /// reported through `Output::status`, not as an error.
    async fn run(&self, invocation: &Invocation) -> Result<Output>;
}

// ── Package Manager Port ──────────────────────────────────────────────────────

/// The distribution's package manager.
#[allow(async_fn_in_trait)]
pub trait PackageManager {
    /// Install the given packages non-interactively.
    ///
    /// # Errors
    ///
    /// Returns an error if no package manager is available or the install
    /// command fails.
    async fn install_packages(&self, packages: &[&str]) -> Result<()>;

    /// Name of the distribution package that provides `pip`.
    fn pip_package_name(&self) -> &str;
}

// ── Tool Lookup Port ──────────────────────────────────────────────────────────

/// Resolves executables on the process `PATH`.
#[cfg_attr(test, mockall::automock)]
pub trait ToolLocator {
    /// Full path of `program`, or `None` when it is not on `PATH`.
    fn find(&self, program: &str) -> Option<PathBuf>;
}

// ── Console Port ──────────────────────────────────────────────────────────────

/// Destination for tool output forwarded to the operator.
pub trait ConsoleSink {
    /// Write `text` as-is.
    fn forward(&self, text: &str);
}
