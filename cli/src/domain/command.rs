//! Command-line construction for the Ansible tools.
//!
//! Pure functions: option-bag rendering, the version-gated `ansible-pull`
//! planner, and the controller's clone / playbook commands.

use semver::Version;

use crate::domain::config::{OptionBag, OptionValue, PlaybookRun, PullSpec, Repository};
use crate::domain::error::ProvisionError;
use crate::domain::version::{DIFF_FLAG_MIN, MULTI_PLAYBOOK_MIN};

pub const ANSIBLE_PULL: &str = "ansible-pull";
pub const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";
pub const GIT: &str = "git";

/// Render an option-bag as long flags.
///
/// `true` becomes `--key`, `false` is dropped, anything else becomes
/// `--key=value`. Underscores in keys are written as hyphens.
#[must_use]
pub fn render_flags(options: &OptionBag) -> Vec<String> {
    options
        .iter()
        .filter_map(|(key, value)| {
            let key = key.replace('_', "-");
            match value {
                OptionValue::Flag(true) => Some(format!("--{key}")),
                OptionValue::Flag(false) => None,
                OptionValue::Number(n) => Some(format!("--{key}={n}")),
                OptionValue::Value(v) => Some(format!("--{key}={v}")),
            }
        })
        .collect()
}

/// Plan the `ansible-pull` invocations for one work item.
///
/// Each returned vector is a full argv starting with `ansible-pull`. A known
/// version at or above 2.12.0 gets one invocation carrying every playbook;
/// older or unknown versions get one invocation per playbook, each with the
/// full flag set.
///
/// # Errors
///
/// Returns [`ProvisionError::UnsupportedOption`] when `diff` is requested and
/// the known version predates it.
pub fn plan_pull(
    spec: &PullSpec,
    version: Option<&Version>,
) -> Result<Vec<Vec<String>>, ProvisionError> {
    if let Some(v) = version.filter(|v| **v < DIFF_FLAG_MIN && spec.options.is_enabled("diff")) {
        return Err(ProvisionError::UnsupportedOption {
            version: v.clone(),
            option: "diff".to_string(),
        });
    }

    let mut flags = vec![format!("--url={}", spec.url)];
    flags.extend(render_flags(&spec.options));

    let playbooks = spec.playbooks.names();
    let batched = version.is_some_and(|v| *v >= MULTI_PLAYBOOK_MIN);
    let argv = |names: &[&str]| {
        let mut argv = Vec::with_capacity(1 + flags.len() + names.len());
        argv.push(ANSIBLE_PULL.to_string());
        argv.extend(flags.iter().cloned());
        argv.extend(names.iter().map(|n| (*n).to_string()));
        argv
    };

    if batched {
        Ok(vec![argv(&playbooks)])
    } else {
        Ok(playbooks.iter().map(|p| argv(std::slice::from_ref(p))).collect())
    }
}

/// `git clone <source> <path>`.
#[must_use]
pub fn clone_command(repo: &Repository) -> Vec<String> {
    vec![
        GIT.to_string(),
        "clone".to_string(),
        repo.source.clone(),
        repo.path.clone(),
    ]
}

/// `ansible-playbook <playbook_name> <flags...>`, to run inside `playbook_dir`.
#[must_use]
pub fn playbook_command(run: &PlaybookRun) -> Vec<String> {
    let mut argv = vec![ANSIBLE_PLAYBOOK.to_string(), run.playbook_name.clone()];
    argv.extend(render_flags(&run.options));
    argv
}
