//! Run command: install Ansible and apply the configured workflows.

use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::application::services::provision::{
    ProvisionDeps, ProvisionOptions, ProvisionOutcome, provision,
};
use crate::commands::ConfigArgs;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::load_document;
use crate::infra::console::StdoutSink;
use crate::infra::locator::PathLocator;
use crate::infra::package_manager::SystemPackageManager;
use crate::output::OutputContext;

/// Home used for tool commands when the current one cannot be determined.
const FALLBACK_HOME: &str = "/root";

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: ConfigArgs,

    /// Python interpreter used for pip installs
    #[arg(long, default_value = "python3", value_name = "BIN")]
    pub python: String,

    /// Kill any single command that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,
}

/// Run the run command.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded, the section is
/// invalid, or any install or workflow step fails.
pub async fn run(ctx: &OutputContext, args: &RunArgs) -> Result<()> {
    let document = load_document(&args.source.config)?;

    let runner = TokioCommandRunner::new(args.command_timeout.map(Duration::from_secs));
    let locator = PathLocator;
    let packages = SystemPackageManager::detect(&runner, &locator);
    let console = StdoutSink;
    let deps = ProvisionDeps {
        runner: &runner,
        packages: &packages,
        locator: &locator,
        console: &console,
    };
    let opts = ProvisionOptions {
        home: dirs::home_dir()
            .map_or_else(|| FALLBACK_HOME.to_string(), |h| h.display().to_string()),
        python: args.python.clone(),
        path: std::env::var("PATH").ok(),
    };

    match provision(&document, &deps, &opts).await? {
        ProvisionOutcome::Skipped => ctx.warn("No 'ansible' section, nothing to do"),
        ProvisionOutcome::Completed {
            galaxy_actions,
            pull_invocations,
            playbook_runs,
        } => {
            ctx.success("Ansible provisioning complete");
            ctx.kv("galaxy actions:", &galaxy_actions.to_string());
            ctx.kv("pull runs:     ", &pull_invocations.to_string());
            ctx.kv("playbook runs: ", &playbook_runs.to_string());
        }
    }
    Ok(())
}
