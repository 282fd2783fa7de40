//! Galaxy actions — auxiliary commands run verbatim before any pull.

use anyhow::Result;

use crate::application::ports::CommandRunner;
use crate::application::services::context::ExecutionContext;
use crate::domain::config::GalaxySpec;

/// Run every configured action in order. An empty action list only warns.
///
/// # Errors
///
/// Returns the first failing action's error; later actions do not run.
pub async fn run_galaxy<R: CommandRunner>(
    ctx: &ExecutionContext<'_, R>,
    spec: &GalaxySpec,
) -> Result<usize> {
    if spec.actions.is_empty() {
        tracing::warn!("Invalid config: galaxy section has no actions");
        return Ok(0);
    }
    for action in &spec.actions {
        tracing::info!(command = %action.join(" "), "Running galaxy action");
        ctx.run(action).await?;
    }
    Ok(spec.actions.len())
}
