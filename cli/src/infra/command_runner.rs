//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution, with an optional timeout that kills the
//! child when it fires.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::application::ports::{CommandRunner, Invocation};

/// Production `CommandRunner`.
///
/// Without a timeout a command may run for as long as it needs (package
/// installs and playbook runs routinely take minutes). With one, an expired
/// child is killed and reaped before the timeout error is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<Output> {
        let program = invocation.program.as_str();
        let mut command = tokio::process::Command::new(program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        let collect = async {
            let (status, stdout, stderr) = tokio::join!(
                child.wait(),
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stdout_handle {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stderr_handle {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
            );
            Ok::<_, anyhow::Error>(Output {
                status: status.with_context(|| format!("waiting for {program}"))?,
                stdout,
                stderr,
            })
        };

        let Some(timeout) = self.timeout else {
            return collect.await;
        };
        let finished = tokio::select! {
            result = collect => Some(result),
            () = tokio::time::sleep(timeout) => None,
        };
        if let Some(result) = finished {
            return result;
        }

        // `collect` has been dropped, so `child` is free to kill.
        if let Err(e) = child.kill().await {
            tracing::debug!(program, error = %e, "failed to kill timed out process");
        }
        anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
    }
}
