//! Installing Ansible — distribution packages or pip.
//!
//! Both installers share the [`ToolInstaller`] capability set and are
//! idempotent: nothing is installed when the tool is already present.

use anyhow::Result;

use crate::application::ports::{CommandRunner, PackageManager, ToolLocator};
use crate::application::services::context::ExecutionContext;
use crate::domain::config::InstallMethod;
use crate::domain::error::ProvisionError;

/// Executable whose presence means Ansible is installed.
pub const ANSIBLE_BIN: &str = "ansible";

const USER_BASE_SCRIPT: &str = "import site; print(site.getuserbase())";
const EXTERNALLY_MANAGED_SCRIPT: &str = "import os, sysconfig; \
     print(os.path.exists(os.path.join(sysconfig.get_path('stdlib'), 'EXTERNALLY-MANAGED')))";

/// Capability set shared by every install method.
#[allow(async_fn_in_trait)]
pub trait ToolInstaller {
    /// Whether Ansible is already available.
    async fn is_installed<R: CommandRunner>(&self, ctx: &ExecutionContext<'_, R>) -> Result<bool>;

    /// Install `package` unless Ansible is already available.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Install`] if the install command fails.
    async fn install<R: CommandRunner>(
        &self,
        ctx: &ExecutionContext<'_, R>,
        package: &str,
    ) -> Result<()>;

    /// Fail when Ansible is still missing after [`install`](Self::install).
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::MissingDependency`] if Ansible is absent.
    async fn check_deps<R: CommandRunner>(&self, ctx: &ExecutionContext<'_, R>) -> Result<()> {
        if self.is_installed(ctx).await? {
            Ok(())
        } else {
            Err(ProvisionError::MissingDependency(ANSIBLE_BIN.to_string()).into())
        }
    }
}

fn install_error(package: &str, err: &anyhow::Error) -> anyhow::Error {
    ProvisionError::Install {
        package: package.to_string(),
        reason: format!("{err:#}"),
    }
    .into()
}

// ── Distro ────────────────────────────────────────────────────────────────────

/// Installs through the distribution package manager.
pub struct DistroInstaller<'a, P, L> {
    packages: &'a P,
    locator: &'a L,
}

impl<'a, P: PackageManager, L: ToolLocator> DistroInstaller<'a, P, L> {
    pub fn new(packages: &'a P, locator: &'a L) -> Self {
        Self { packages, locator }
    }
}

impl<P: PackageManager, L: ToolLocator> ToolInstaller for DistroInstaller<'_, P, L> {
    async fn is_installed<R: CommandRunner>(&self, _: &ExecutionContext<'_, R>) -> Result<bool> {
        Ok(self.locator.find(ANSIBLE_BIN).is_some())
    }

    async fn install<R: CommandRunner>(
        &self,
        ctx: &ExecutionContext<'_, R>,
        package: &str,
    ) -> Result<()> {
        if self.is_installed(ctx).await? {
            tracing::debug!("{ANSIBLE_BIN} already on PATH, skipping install");
            return Ok(());
        }
        tracing::info!("Installing the {package} package");
        self.packages
            .install_packages(&[package])
            .await
            .map_err(|e| install_error(package, &e))?;
        tracing::info!("Installed the {package} package");
        Ok(())
    }
}

// ── Pip ───────────────────────────────────────────────────────────────────────

/// Installs with `python -m pip`, into the user site when a run user is set.
pub struct PipInstaller<'a, P> {
    packages: &'a P,
    python: String,
}

impl<'a, P: PackageManager> PipInstaller<'a, P> {
    /// Create the installer and, for a run user, put the user-site `bin`
    /// directory on the context's `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the user-site query fails.
    pub async fn prepare<R: CommandRunner>(
        packages: &'a P,
        python: &str,
        ctx: &mut ExecutionContext<'_, R>,
    ) -> Result<Self> {
        if ctx.run_user().is_some() {
            let out = ctx.run(&[python, "-c", USER_BASE_SCRIPT]).await?;
            let user_base = out.stdout.trim();
            ctx.append_path(format!("{user_base}/bin/"));
        }
        Ok(Self {
            packages,
            python: python.to_string(),
        })
    }

    async fn bootstrap_pip_if_required<R: CommandRunner>(
        &self,
        ctx: &ExecutionContext<'_, R>,
    ) -> Result<()> {
        let probe = ctx.probe(&[self.python.as_str(), "-m", "pip", "--version"]).await?;
        if probe.success {
            return Ok(());
        }
        let pip_package = self.packages.pip_package_name();
        tracing::info!("pip not available, installing {pip_package}");
        self.packages
            .install_packages(&[pip_package])
            .await
            .map_err(|e| install_error(pip_package, &e))
    }

    async fn externally_managed<R: CommandRunner>(&self, ctx: &ExecutionContext<'_, R>) -> Result<bool> {
        let probe = ctx
            .probe(&[self.python.as_str(), "-c", EXTERNALLY_MANAGED_SCRIPT])
            .await?;
        Ok(probe.success && probe.stdout.trim() == "True")
    }

    /// Best effort: a failed pip upgrade is logged and otherwise ignored.
    async fn upgrade_pip<R: CommandRunner>(&self, ctx: &ExecutionContext<'_, R>, cmd: &[String]) {
        tracing::info!("Upgrading pip");
        let mut argv = cmd.to_vec();
        argv.extend(["--upgrade".to_string(), "pip".to_string()]);
        match ctx.run(&argv).await {
            Ok(_) => tracing::info!("Upgraded pip"),
            Err(e) => tracing::warn!(
                "Failed at upgrading pip. This is usually not critical so the script will skip this step.\n{e:#}"
            ),
        }
    }
}

impl<P: PackageManager> ToolInstaller for PipInstaller<'_, P> {
    async fn is_installed<R: CommandRunner>(&self, ctx: &ExecutionContext<'_, R>) -> Result<bool> {
        let mut argv = vec![self.python.as_str(), "-m", "pip", "list"];
        if ctx.run_user().is_some() {
            argv.push("--user");
        }
        let out = ctx.run(&argv).await?;
        Ok(out.stdout.contains(ANSIBLE_BIN))
    }

    async fn install<R: CommandRunner>(
        &self,
        ctx: &ExecutionContext<'_, R>,
        package: &str,
    ) -> Result<()> {
        self.bootstrap_pip_if_required(ctx).await?;
        if self.is_installed(ctx).await? {
            tracing::debug!("{ANSIBLE_BIN} already listed by pip, skipping install");
            return Ok(());
        }

        let mut cmd: Vec<String> = [self.python.as_str(), "-m", "pip", "install"]
            .iter()
            .map(ToString::to_string)
            .collect();
        if self.externally_managed(ctx).await? {
            cmd.push("--break-system-packages".to_string());
        }
        if ctx.run_user().is_some() {
            cmd.push("--user".to_string());
        }

        self.upgrade_pip(ctx, &cmd).await;

        tracing::info!("Installing the {package} package");
        let mut argv = cmd;
        argv.push(package.to_string());
        ctx.run(&argv).await.map_err(|e| install_error(package, &e))?;
        tracing::info!("Installed the {package} package");
        Ok(())
    }
}

// ── Selection ─────────────────────────────────────────────────────────────────

/// The installer chosen by `install_method`.
pub enum Installer<'a, P, L> {
    Distro(DistroInstaller<'a, P, L>),
    Pip(PipInstaller<'a, P>),
}

impl<'a, P: PackageManager, L: ToolLocator> Installer<'a, P, L> {
    /// Build the installer for `method`.
    ///
    /// # Errors
    ///
    /// Returns an error if preparing the pip installer fails.
    pub async fn select<R: CommandRunner>(
        method: InstallMethod,
        packages: &'a P,
        locator: &'a L,
        python: &str,
        ctx: &mut ExecutionContext<'_, R>,
    ) -> Result<Self> {
        Ok(match method {
            InstallMethod::Pip => Self::Pip(PipInstaller::prepare(packages, python, ctx).await?),
            InstallMethod::Distro => Self::Distro(DistroInstaller::new(packages, locator)),
        })
    }
}

impl<P: PackageManager, L: ToolLocator> ToolInstaller for Installer<'_, P, L> {
    async fn is_installed<R: CommandRunner>(&self, ctx: &ExecutionContext<'_, R>) -> Result<bool> {
        match self {
            Self::Distro(i) => i.is_installed(ctx).await,
            Self::Pip(i) => i.is_installed(ctx).await,
        }
    }

    async fn install<R: CommandRunner>(
        &self,
        ctx: &ExecutionContext<'_, R>,
        package: &str,
    ) -> Result<()> {
        match self {
            Self::Distro(i) => i.install(ctx, package).await,
            Self::Pip(i) => i.install(ctx, package).await,
        }
    }
}
