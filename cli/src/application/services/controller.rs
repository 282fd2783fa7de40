//! Controller setup — clone repositories, then run playbooks inside them.

use anyhow::Result;

use crate::application::ports::CommandRunner;
use crate::application::services::context::ExecutionContext;
use crate::domain::command::{clone_command, playbook_command};
use crate::domain::config::ControllerSpec;

/// Clone every repository, then run every playbook in its directory.
///
/// # Errors
///
/// Returns the first failing command's error; nothing after it runs.
pub async fn run_controller<R: CommandRunner>(
    ctx: &ExecutionContext<'_, R>,
    spec: &ControllerSpec,
) -> Result<usize> {
    for repo in &spec.repositories {
        tracing::info!(source = %repo.source, path = %repo.path, "Cloning repository");
        ctx.run(&clone_command(repo)).await?;
    }
    for run in &spec.run_ansible {
        tracing::info!(
            playbook = %run.playbook_name,
            dir = %run.playbook_dir,
            "Running ansible-playbook"
        );
        ctx.run_in(&playbook_command(run), &run.playbook_dir).await?;
    }
    Ok(spec.run_ansible.len())
}
