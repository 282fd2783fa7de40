//! Infrastructure implementation of the `PackageManager` port.
//!
//! Detects the distribution's package tool on `PATH` and drives it
//! non-interactively through the `CommandRunner` port.

use anyhow::{Result, bail};

use crate::application::ports::{CommandRunner, Invocation, PackageManager, ToolLocator};

/// Package tools this adapter knows how to drive, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTool {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Apk,
    Pacman,
}

impl PackageTool {
    const ALL: [Self; 6] = [
        Self::Apt,
        Self::Dnf,
        Self::Yum,
        Self::Zypper,
        Self::Apk,
        Self::Pacman,
    ];

    /// Executable probed on `PATH`.
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Zypper => "zypper",
            Self::Apk => "apk",
            Self::Pacman => "pacman",
        }
    }

    /// First tool found by `locator`.
    pub fn detect(locator: &impl ToolLocator) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| locator.find(tool.program()).is_some())
    }

    /// Package index refresh that must precede an install, if any.
    fn refresh(self) -> Option<Invocation> {
        match self {
            Self::Apt => Some(apt(&["update"])),
            _ => None,
        }
    }

    fn install(self, packages: &[&str]) -> Invocation {
        let mut args: Vec<&str> = match self {
            Self::Apt => vec!["install", "-y", "--no-install-recommends"],
            Self::Dnf | Self::Yum => vec!["install", "-y"],
            Self::Zypper => vec!["--non-interactive", "install"],
            Self::Apk => vec!["add", "--no-cache"],
            Self::Pacman => vec!["-S", "--noconfirm", "--needed"],
        };
        args.extend_from_slice(packages);
        match self {
            Self::Apt => apt(&args),
            _ => Invocation::new(self.program(), &args),
        }
    }

    /// Distribution package that provides `pip` for the system python.
    #[must_use]
    pub fn pip_package(self) -> &'static str {
        match self {
            Self::Apk => "py3-pip",
            Self::Pacman => "python-pip",
            Self::Apt | Self::Dnf | Self::Yum | Self::Zypper => "python3-pip",
        }
    }
}

fn apt(args: &[&str]) -> Invocation {
    let mut invocation = Invocation::new(PackageTool::Apt.program(), args);
    invocation
        .env
        .push(("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string()));
    invocation
}

/// `PackageManager` backed by whichever package tool the host has.
pub struct SystemPackageManager<'a, R: CommandRunner> {
    runner: &'a R,
    tool: Option<PackageTool>,
}

impl<'a, R: CommandRunner> SystemPackageManager<'a, R> {
    /// Detect the package tool once, up front.
    pub fn detect(runner: &'a R, locator: &impl ToolLocator) -> Self {
        let tool = PackageTool::detect(locator);
        tracing::debug!(tool = ?tool, "detected package tool");
        Self { runner, tool }
    }

    async fn run(&self, invocation: &Invocation) -> Result<()> {
        tracing::info!(command = %invocation.display(), "running package manager");
        let output = self.runner.run(invocation).await?;
        if !output.status.success() {
            bail!(
                "{} failed: {}",
                invocation.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl<R: CommandRunner> PackageManager for SystemPackageManager<'_, R> {
    async fn install_packages(&self, packages: &[&str]) -> Result<()> {
        let Some(tool) = self.tool else {
            bail!("no supported package manager found on PATH");
        };
        if packages.is_empty() {
            return Ok(());
        }
        if let Some(refresh) = tool.refresh() {
            self.run(&refresh).await?;
        }
        self.run(&tool.install(packages)).await
    }

    fn pip_package_name(&self) -> &str {
        self.tool.map_or("python3-pip", PackageTool::pip_package)
    }
}
