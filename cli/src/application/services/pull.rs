//! `ansible-pull` work items, planned against the installed version.

use anyhow::Result;
use semver::Version;

use crate::application::ports::{CommandRunner, ConsoleSink};
use crate::application::services::context::ExecutionContext;
use crate::domain::command::{ANSIBLE_PULL, plan_pull};
use crate::domain::config::PullSpec;
use crate::domain::version::parse_tool_version;

/// Ask `ansible-pull` for its version; `None` when the banner is unparseable.
///
/// # Errors
///
/// Returns an error if `ansible-pull --version` cannot run or exits non-zero.
pub async fn query_version<R: CommandRunner>(
    ctx: &ExecutionContext<'_, R>,
) -> Result<Option<Version>> {
    let out = ctx.run(&[ANSIBLE_PULL, "--version"]).await?;
    Ok(parse_tool_version(&out.stdout))
}

/// Run one pull item. Non-empty stdout of each invocation is forwarded to
/// `console` unparsed.
///
/// # Errors
///
/// Returns [`UnsupportedOption`](crate::domain::ProvisionError::UnsupportedOption)
/// before any pull runs when a flag is too new for the installed version,
/// or the first failing invocation's error.
pub async fn run_pull<R: CommandRunner>(
    ctx: &ExecutionContext<'_, R>,
    spec: &PullSpec,
    console: &impl ConsoleSink,
) -> Result<usize> {
    let version = query_version(ctx).await?;
    match &version {
        Some(v) => tracing::debug!(version = %v, "detected ansible-pull"),
        None => tracing::warn!("Cannot parse ansible version"),
    }

    let plan = plan_pull(spec, version.as_ref())?;
    for argv in &plan {
        tracing::info!(url = %spec.url, playbooks = %argv_tail(argv), "Running ansible-pull");
        let out = ctx.run(argv).await?;
        if !out.stdout.is_empty() {
            console.forward(&out.stdout);
        }
    }
    Ok(plan.len())
}

fn argv_tail(argv: &[String]) -> String {
    argv.iter()
        .skip(1)
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .collect::<Vec<_>>()
        .join(" ")
}
