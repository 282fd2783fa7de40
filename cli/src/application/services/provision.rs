//! Application service — the provisioning use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use anyhow::Result;
use serde_yaml::Value;

use crate::application::ports::{CommandRunner, ConsoleSink, PackageManager, ToolLocator};
use crate::application::services::context::{CONFIG_OVERRIDE_ENV, ExecutionContext};
use crate::application::services::controller::run_controller;
use crate::application::services::galaxy::run_galaxy;
use crate::application::services::installer::{Installer, ToolInstaller};
use crate::application::services::pull::run_pull;
use crate::domain::config::{self, AnsibleConfig, parse_config};
use crate::domain::error::ProvisionError;

/// Injected infrastructure for one provisioning run.
pub struct ProvisionDeps<'a, R, P, L, C> {
    pub runner: &'a R,
    pub packages: &'a P,
    pub locator: &'a L,
    pub console: &'a C,
}

/// Host settings that are not part of the document.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Default `HOME` for every command.
    pub home: String,
    /// Python interpreter used by the pip installer.
    pub python: String,
    /// `PATH` the extra user-site directories are appended to.
    pub path: Option<String>,
}

/// Outcome of the `provision` use-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The document has no (or an empty) `ansible` section.
    Skipped,
    /// Every configured workflow ran to completion.
    Completed {
        galaxy_actions: usize,
        pull_invocations: usize,
        playbook_runs: usize,
    },
}

/// Provision from a whole cloud-config document.
///
/// A missing or empty `ansible` section is a no-op. Otherwise the section is
/// validated before any command runs.
///
/// # Errors
///
/// Returns [`ProvisionError::Validation`] for a malformed section, or the
/// first error raised while installing or running a workflow.
pub async fn provision<R, P, L, C>(
    document: &Value,
    deps: &ProvisionDeps<'_, R, P, L, C>,
    opts: &ProvisionOptions,
) -> Result<ProvisionOutcome>
where
    R: CommandRunner,
    P: PackageManager,
    L: ToolLocator,
    C: ConsoleSink,
{
    let Some(section) = config::section(document) else {
        tracing::info!("No '{}' section, nothing to do", config::SECTION_KEY);
        return Ok(ProvisionOutcome::Skipped);
    };
    let cfg = parse_config(section).map_err(ProvisionError::from)?;
    run_config(&cfg, deps, opts).await
}

/// Provision from an already validated config.
///
/// Installs Ansible, then runs galaxy actions, pull items and the
/// controller setup, in that order. The first failure stops the run.
///
/// # Errors
///
/// Returns the first install or workflow error.
pub async fn run_config<R, P, L, C>(
    cfg: &AnsibleConfig,
    deps: &ProvisionDeps<'_, R, P, L, C>,
    opts: &ProvisionOptions,
) -> Result<ProvisionOutcome>
where
    R: CommandRunner,
    P: PackageManager,
    L: ToolLocator,
    C: ConsoleSink,
{
    let mut ctx = ExecutionContext::new(
        deps.runner,
        cfg.run_user.clone(),
        opts.home.clone(),
        opts.path.clone(),
    );

    let installer = Installer::select(
        cfg.install_method,
        deps.packages,
        deps.locator,
        &opts.python,
        &mut ctx,
    )
    .await?;
    installer.install(&ctx, &cfg.package_name).await?;
    installer.check_deps(&ctx).await?;

    if let Some(path) = &cfg.ansible_config {
        ctx.set_env(CONFIG_OVERRIDE_ENV, path);
    }

    let galaxy_actions = match &cfg.galaxy {
        Some(galaxy) => run_galaxy(&ctx, galaxy).await?,
        None => 0,
    };

    let mut pull_invocations = 0;
    for spec in &cfg.pull {
        pull_invocations += run_pull(&ctx, spec, deps.console).await?;
    }

    let playbook_runs = match &cfg.setup_controller {
        Some(controller) => run_controller(&ctx, controller).await?,
        None => 0,
    };

    Ok(ProvisionOutcome::Completed {
        galaxy_actions,
        pull_invocations,
        playbook_runs,
    })
}
