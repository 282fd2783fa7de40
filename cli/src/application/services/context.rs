//! Execution context — runs tool commands as the current user or as the
//! configured run user, with a fixed environment overlay.
//!
//! The run user is resolved once at construction. With a run user every
//! command goes through `su - <user> -c "..."`; without one the program is
//! spawned directly. Either way the overlay (`HOME`, optional
//! `ANSIBLE_CONFIG`) and any extra `PATH` directories are applied.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::application::ports::{CommandRunner, Invocation};
use crate::domain::error::ProvisionError;

/// Environment key Ansible reads its configuration file path from.
pub const CONFIG_OVERRIDE_ENV: &str = "ANSIBLE_CONFIG";

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Output of a command whose exit status is inspected rather than enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Privilege/environment adapter shared by every workflow of one run.
pub struct ExecutionContext<'a, R: CommandRunner> {
    runner: &'a R,
    run_user: Option<String>,
    env: BTreeMap<String, String>,
    base_path: Option<String>,
    extra_path: Vec<String>,
}

impl<'a, R: CommandRunner> ExecutionContext<'a, R> {
    /// Create a context. `home` seeds the `HOME` entry of the overlay;
    /// `base_path` is the `PATH` extra directories are appended to.
    pub fn new(
        runner: &'a R,
        run_user: Option<String>,
        home: String,
        base_path: Option<String>,
    ) -> Self {
        let mut env = BTreeMap::new();
        env.insert("HOME".to_string(), home);
        Self {
            runner,
            run_user,
            env,
            base_path,
            extra_path: Vec::new(),
        }
    }

    #[must_use]
    pub fn run_user(&self) -> Option<&str> {
        self.run_user.as_deref()
    }

    pub fn set_env(&mut self, key: &str, value: &str) {
        self.env.insert(key.to_string(), value.to_string());
    }

    /// Append a directory to the `PATH` seen by every later command.
    pub fn append_path(&mut self, dir: String) {
        self.extra_path.push(dir);
    }

    /// Build the invocation for `argv`, switching user when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if `argv` is empty or a word cannot be shell-quoted.
    pub fn invocation<S: AsRef<str>>(&self, argv: &[S], cwd: Option<&str>) -> Result<Invocation> {
        let Some((program, args)) = argv.split_first() else {
            bail!("cannot run an empty command");
        };
        match &self.run_user {
            None => {
                let mut invocation = Invocation::new(program.as_ref(), args);
                invocation.env = self
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if let Some(path) = self.direct_path() {
                    invocation.env.push(("PATH".to_string(), path));
                }
                invocation.cwd = cwd.map(PathBuf::from);
                Ok(invocation)
            }
            Some(user) => {
                let script = self.user_script(argv, cwd)?;
                Ok(Invocation::new("su", &["-", user.as_str(), "-c", script.as_str()]))
            }
        }
    }

    /// Run `argv` and fail on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::CommandExecution`] on a non-zero exit, or the
    /// runner's error if the process could not be started.
    pub async fn run<S: AsRef<str>>(&self, argv: &[S]) -> Result<CommandOutput> {
        self.run_checked(argv, None).await
    }

    /// Like [`run`](Self::run), inside `cwd`.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub async fn run_in<S: AsRef<str>>(&self, argv: &[S], cwd: &str) -> Result<CommandOutput> {
        self.run_checked(argv, Some(cwd)).await
    }

    /// Run `argv` and report the exit status instead of failing on it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started.
    pub async fn probe<S: AsRef<str>>(&self, argv: &[S]) -> Result<ProbeOutput> {
        let invocation = self.invocation(argv, None)?;
        tracing::debug!(command = %invocation.display(), "probing");
        let output = self.runner.run(&invocation).await?;
        Ok(ProbeOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_checked<S: AsRef<str>>(
        &self,
        argv: &[S],
        cwd: Option<&str>,
    ) -> Result<CommandOutput> {
        let invocation = self.invocation(argv, cwd)?;
        tracing::debug!(command = %invocation.display(), user = ?self.run_user, "running");
        let output = self.runner.run(&invocation).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ProvisionError::CommandExecution {
                command: render_argv(argv),
                code: output.status.code(),
                stdout,
                stderr,
            }
            .into());
        }
        Ok(CommandOutput { stdout, stderr })
    }

    fn direct_path(&self) -> Option<String> {
        if self.extra_path.is_empty() {
            return None;
        }
        let parts: Vec<&str> = self
            .base_path
            .as_deref()
            .into_iter()
            .chain(self.extra_path.iter().map(String::as_str))
            .collect();
        Some(parts.join(":"))
    }

    /// `[cd DIR && ]env K=V... PATH=$PATH[:EXTRA] ARGV...`, each word quoted.
    ///
    /// `HOME` is left to the login shell, which sets the run user's own home.
    fn user_script<S: AsRef<str>>(&self, argv: &[S], cwd: Option<&str>) -> Result<String> {
        let mut script = String::new();
        if let Some(dir) = cwd {
            script.push_str(&format!("cd {} && ", quote(dir)?));
        }
        script.push_str("env");
        for (key, value) in self.env.iter().filter(|(k, _)| k.as_str() != "HOME") {
            script.push(' ');
            script.push_str(&quote(&format!("{key}={value}"))?);
        }
        script.push_str(" PATH=$PATH");
        if !self.extra_path.is_empty() {
            script.push(':');
            script.push_str(&quote(&self.extra_path.join(":"))?);
        }
        for word in argv {
            script.push(' ');
            script.push_str(&quote(word.as_ref())?);
        }
        Ok(script)
    }
}

fn quote(word: &str) -> Result<String> {
    Ok(shlex::try_quote(word)?.into_owned())
}

fn render_argv<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(" ")
}
