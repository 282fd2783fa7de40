//! Unit tests for the provisioning use-case.
//!
//! Every test drives `provision()` end to end with the scripted runner, the
//! fake distribution and the recording console; no process is spawned.

#![allow(clippy::expect_used)]

use std::path::PathBuf;

use ansible_bootstrap::application::services::provision::{
    ProvisionDeps, ProvisionOptions, ProvisionOutcome, provision,
};
use ansible_bootstrap::domain::{ProvisionError, ValidationKind};
use anyhow::Result;
use serde_yaml::Value;

use crate::mocks::{FakeDistro, RecordingConsole, ScriptedRunner, flat};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn doc(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).expect("valid yaml")
}

fn opts() -> ProvisionOptions {
    ProvisionOptions {
        home: "/root".to_string(),
        python: "python3".to_string(),
        path: Some("/usr/bin:/bin".to_string()),
    }
}

async fn provision_with(
    document: &Value,
    runner: &ScriptedRunner,
    distro: &FakeDistro,
    console: &RecordingConsole,
) -> Result<ProvisionOutcome> {
    let deps = ProvisionDeps {
        runner,
        packages: distro,
        locator: distro,
        console,
    };
    provision(document, &deps, &opts()).await
}

fn provision_error(err: &anyhow::Error) -> &ProvisionError {
    err.downcast_ref::<ProvisionError>()
        .unwrap_or_else(|| panic!("expected ProvisionError, got: {err:#}"))
}

const TWO_PLAYBOOKS: &str = r"
ansible:
  install_method: distro
  package_name: ansible
  pull:
    - url: https://github.com/example/site.git
      playbook_names: [one.yml, two.yml]
      connection: local
";

// ── Skips and validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_section_is_skipped_without_commands() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();

    let outcome = provision_with(&doc("runcmd: [ls]"), &runner, &distro, &console)
        .await
        .expect("skip");

    assert_eq!(outcome, ProvisionOutcome::Skipped);
    assert!(runner.calls().is_empty());
    assert!(distro.installs().is_empty());
}

#[tokio::test]
async fn test_empty_section_is_skipped() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();

    let outcome = provision_with(&doc("ansible: {}"), &runner, &distro, &console)
        .await
        .expect("skip");

    assert_eq!(outcome, ProvisionOutcome::Skipped);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_validation_failure_runs_no_commands() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: pip
  package_name: ansible
  pull:
    - url: https://x
      playbook_name: a.yml
      playbook_names: [b.yml]
",
    );

    let err = provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("invalid");

    match provision_error(&err) {
        ProvisionError::Validation(v) => assert_eq!(v.kind, ValidationKind::MutuallyExclusive),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(runner.calls().is_empty());
    assert!(distro.installs().is_empty());
}

async fn assert_missing_key_runs_nothing(yaml: &str, key: &str) {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();

    let err = provision_with(&doc(yaml), &runner, &distro, &console)
        .await
        .expect_err("invalid");

    match provision_error(&err) {
        ProvisionError::Validation(v) => {
            assert_eq!(v.kind, ValidationKind::MissingKey);
            assert!(v.to_string().contains(&format!("'{key}'")), "got: {v}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(runner.calls().is_empty());
    assert!(distro.installs().is_empty());
}

#[tokio::test]
async fn test_missing_install_method_runs_no_commands() {
    assert_missing_key_runs_nothing("ansible:\n  package_name: ansible\n", "install_method").await;
}

#[tokio::test]
async fn test_missing_package_name_runs_no_commands() {
    assert_missing_key_runs_nothing("ansible:\n  install_method: distro\n", "package_name").await;
}

#[tokio::test]
async fn test_unknown_install_method_rejected_before_any_command() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();
    let document = doc("ansible: {install_method: snap, package_name: ansible}");

    let err = provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("invalid");

    match provision_error(&err) {
        ProvisionError::Validation(v) => assert_eq!(v.kind, ValidationKind::InvalidValue),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(runner.calls().is_empty());
}

// ── Version-dependent pull planning ───────────────────────────────────────────

#[tokio::test]
async fn test_new_ansible_batches_playbooks_into_one_invocation() {
    let runner = ScriptedRunner::new().on("ansible-pull --version", &[(0, "ansible-pull [core 2.12.0]\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();

    let outcome = provision_with(&doc(TWO_PLAYBOOKS), &runner, &distro, &console)
        .await
        .expect("provision");

    assert_eq!(
        runner.commands(),
        [
            "ansible-pull --version",
            "ansible-pull --url=https://github.com/example/site.git --connection=local one.yml two.yml",
        ]
    );
    assert_eq!(
        outcome,
        ProvisionOutcome::Completed {
            galaxy_actions: 0,
            pull_invocations: 1,
            playbook_runs: 0,
        }
    );
}

#[tokio::test]
async fn test_old_ansible_runs_one_invocation_per_playbook() {
    let runner = ScriptedRunner::new().on("ansible-pull --version", &[(0, "ansible-pull 2.11.9\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();

    provision_with(&doc(TWO_PLAYBOOKS), &runner, &distro, &console)
        .await
        .expect("provision");

    assert_eq!(
        runner.commands(),
        [
            "ansible-pull --version",
            "ansible-pull --url=https://github.com/example/site.git --connection=local one.yml",
            "ansible-pull --url=https://github.com/example/site.git --connection=local two.yml",
        ]
    );
}

#[tokio::test]
async fn test_unparseable_version_falls_back_to_per_playbook() {
    let runner = ScriptedRunner::new().on("ansible-pull --version", &[(0, "ansible-pull (devel)\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();

    let outcome = provision_with(&doc(TWO_PLAYBOOKS), &runner, &distro, &console)
        .await
        .expect("provision");

    assert!(matches!(
        outcome,
        ProvisionOutcome::Completed {
            pull_invocations: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn test_diff_on_old_ansible_is_rejected_before_pulling() {
    let runner = ScriptedRunner::new().on("ansible-pull --version", &[(0, "ansible-pull 2.6.20\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  pull:
    - url: https://x
      playbook_name: site.yml
      diff: true
",
    );

    let err = provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("unsupported");

    assert_eq!(
        err.to_string(),
        "Ansible version 2.6.20 doesn't support --diff flag, exiting."
    );
    assert_eq!(runner.commands(), ["ansible-pull --version"]);
}

#[tokio::test]
async fn test_diff_false_is_dropped_on_old_ansible() {
    let runner = ScriptedRunner::new().on("ansible-pull --version", &[(0, "ansible-pull 2.6.20\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  pull:
    - url: https://x
      playbook_name: site.yml
      diff: false
      skip_tags: slow
",
    );

    provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision");

    assert_eq!(
        runner.commands()[1],
        "ansible-pull --url=https://x --skip-tags=slow site.yml"
    );
}

// ── Installation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_distro_install_is_idempotent() {
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc("ansible: {install_method: distro, package_name: ansible}");

    for _ in 0..2 {
        let runner = ScriptedRunner::new();
        provision_with(&document, &runner, &distro, &console)
            .await
            .expect("provision");
        assert!(runner.calls().is_empty());
    }
    assert!(distro.installs().is_empty());
}

#[tokio::test]
async fn test_distro_installs_missing_package_once() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();
    let document = doc("ansible: {install_method: distro, package_name: ansible-core}");

    provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision");
    provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision again");

    assert_eq!(distro.installs(), [vec!["ansible-core".to_string()]]);
}

#[tokio::test]
async fn test_install_that_provides_nothing_fails_dependency_check() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::with_empty_package();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  pull:
    - url: https://x
      playbook_name: site.yml
",
    );

    let err = provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("missing");

    assert!(matches!(
        provision_error(&err),
        ProvisionError::MissingDependency(bin) if bin == "ansible"
    ));
    assert_eq!(err.to_string(), "command: ansible is not installed");
    assert!(runner.calls().is_empty(), "no workflow may run");
}

#[tokio::test]
async fn test_failed_package_install_is_install_error() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::with_failing_installs();
    let console = RecordingConsole::default();
    let document = doc("ansible: {install_method: distro, package_name: ansible}");

    let err = provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("install fails");

    match provision_error(&err) {
        ProvisionError::Install { package, reason } => {
            assert_eq!(package, "ansible");
            assert!(reason.contains("Unable to locate package"), "got: {reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_pip_install_as_run_user() {
    let runner = ScriptedRunner::new()
        .on("site.getuserbase", &[(0, "/home/ubuntu/.local\n")])
        .on("pip list", &[(0, "Package Version\n"), (0, "ansible 9.1.0\n")])
        .on("EXTERNALLY-MANAGED", &[(0, "False\n")])
        .on("ansible-pull --version", &[(0, "ansible-pull [core 2.16.2]\n")]);
    let distro = FakeDistro::without_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: pip
  package_name: ansible
  run_user: ubuntu
  pull:
    - url: https://x
      playbook_name: site.yml
",
    );

    provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision");

    let calls = runner.calls();
    assert!(
        calls
            .iter()
            .all(|c| c.program == "su" && c.args[..3] == ["-", "ubuntu", "-c"]),
        "every command runs as the run user"
    );
    let scripts: Vec<Vec<String>> = calls
        .iter()
        .map(|c| shlex::split(&c.args[3]).expect("well-formed script"))
        .collect();
    assert_eq!(scripts.len(), 9, "got: {scripts:#?}");
    let tails: [&[&str]; 9] = [
        &["python3", "-c", "import site; print(site.getuserbase())"],
        &["python3", "-m", "pip", "--version"],
        &["python3", "-m", "pip", "list", "--user"],
        &["python3", "-c"],
        &["python3", "-m", "pip", "install", "--user", "--upgrade", "pip"],
        &["python3", "-m", "pip", "install", "--user", "ansible"],
        &["python3", "-m", "pip", "list", "--user"],
        &["ansible-pull", "--version"],
        &["ansible-pull", "--url=https://x", "site.yml"],
    ];
    for (words, tail) in scripts.iter().zip(tails) {
        let (first, rest) = tail.split_first().expect("non-empty tail");
        let start = words
            .iter()
            .position(|w| w == first)
            .unwrap_or_else(|| panic!("{first} missing from {words:?}"));
        assert_eq!(words[start..start + tail.len()], *tail, "in {words:?}");
    }
    assert!(scripts[3].last().is_some_and(|w| w.contains("EXTERNALLY-MANAGED")));
    assert_eq!(scripts[0][..2], ["env", "PATH=$PATH"]);
    assert!(
        scripts[1..]
            .iter()
            .all(|w| w[..2] == ["env", "PATH=$PATH:/home/ubuntu/.local/bin/"]),
        "user-site bin is on PATH after discovery"
    );
    assert!(distro.installs().is_empty(), "pip was already available");
}

#[tokio::test]
async fn test_pip_on_managed_python_breaks_system_packages() {
    let runner = ScriptedRunner::new()
        .on("pip --version", &[(1, "")])
        .on("pip list", &[(0, ""), (0, "ansible 9.1.0\n")])
        .on("EXTERNALLY-MANAGED", &[(0, "True\n")])
        .on("--upgrade pip", &[(1, "")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc("ansible: {install_method: pip, package_name: ansible}");

    provision_with(&document, &runner, &distro, &console)
        .await
        .expect("upgrade failure is tolerated");

    assert_eq!(distro.installs(), [vec!["python3-pip".to_string()]]);
    let commands = runner.commands();
    assert!(commands.contains(&"python3 -m pip install --break-system-packages ansible".to_string()));
    assert!(!commands.iter().any(|c| c.contains("--user")));
    assert!(!commands.iter().any(|c| c.starts_with("su ")));
}

// ── Workflows ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_playbook_end_to_end() {
    let runner = ScriptedRunner::new()
        .on("ansible-pull --version", &[(0, "ansible-pull [core 2.12.0]\n")])
        .on("ansible-pull --url", &[(0, "PLAY RECAP *****\nlocalhost : ok=3\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  pull:
    - url: https://x
      playbook_name: site.yml
",
    );

    provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision");

    let calls = runner.calls();
    let argvs: Vec<Vec<&str>> = calls
        .iter()
        .map(|c| {
            std::iter::once(c.program.as_str())
                .chain(c.args.iter().map(String::as_str))
                .collect()
        })
        .collect();
    assert_eq!(
        argvs,
        [
            vec!["ansible-pull", "--version"],
            vec!["ansible-pull", "--url=https://x", "site.yml"],
        ]
    );
    assert!(
        calls[1]
            .env
            .contains(&("HOME".to_string(), "/root".to_string()))
    );
    assert_eq!(console.forwarded(), ["PLAY RECAP *****\nlocalhost : ok=3\n"]);
}

#[tokio::test]
async fn test_workflows_run_in_order_with_config_override() {
    let runner = ScriptedRunner::new().on("ansible-pull --version", &[(0, "ansible-pull 2.15.0\n")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  ansible_config: /etc/ansible/ansible.cfg
  galaxy:
    actions:
      - [ansible-galaxy, collection, install, community.general]
  pull:
    - url: https://x
      playbook_name: site.yml
  setup_controller:
    repositories:
      - source: https://github.com/example/ops.git
        path: /opt/ops
    run_ansible:
      - playbook_dir: /opt/ops
        playbook_name: controller.yml
        inventory: hosts.ini
        become: true
",
    );

    let outcome = provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision");

    assert_eq!(
        runner.commands(),
        [
            "ansible-galaxy collection install community.general",
            "ansible-pull --version",
            "ansible-pull --url=https://x site.yml",
            "git clone https://github.com/example/ops.git /opt/ops",
            "ansible-playbook controller.yml --inventory=hosts.ini --become",
        ]
    );
    let calls = runner.calls();
    let config_env = ("ANSIBLE_CONFIG".to_string(), "/etc/ansible/ansible.cfg".to_string());
    assert!(calls.iter().all(|c| c.env.contains(&config_env)));
    assert_eq!(calls[4].cwd, Some(PathBuf::from("/opt/ops")));
    assert_eq!(calls[3].cwd, None);
    assert_eq!(
        outcome,
        ProvisionOutcome::Completed {
            galaxy_actions: 1,
            pull_invocations: 1,
            playbook_runs: 1,
        }
    );
}

#[tokio::test]
async fn test_empty_galaxy_actions_only_warn() {
    let runner = ScriptedRunner::new();
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  galaxy:
    actions: []
",
    );

    let outcome = provision_with(&document, &runner, &distro, &console)
        .await
        .expect("provision");

    assert!(matches!(
        outcome,
        ProvisionOutcome::Completed {
            galaxy_actions: 0,
            ..
        }
    ));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_failing_galaxy_action_stops_the_run() {
    let runner = ScriptedRunner::new().on("ansible-galaxy", &[(1, "")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  galaxy:
    actions:
      - [ansible-galaxy, role, install, geerlingguy.docker]
      - [ansible-galaxy, role, install, geerlingguy.pip]
  pull:
    - url: https://x
      playbook_name: site.yml
",
    );

    let err = provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("galaxy fails");

    match provision_error(&err) {
        ProvisionError::CommandExecution { command, code, .. } => {
            assert_eq!(command, "ansible-galaxy role install geerlingguy.docker");
            assert_eq!(*code, Some(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_failing_clone_skips_playbook_runs() {
    let runner = ScriptedRunner::new().on("git clone", &[(128, "")]);
    let distro = FakeDistro::with_ansible();
    let console = RecordingConsole::default();
    let document = doc(
        r"
ansible:
  install_method: distro
  package_name: ansible
  setup_controller:
    repositories:
      - {source: https://github.com/example/ops.git, path: /opt/ops}
    run_ansible:
      - {playbook_dir: /opt/ops, playbook_name: controller.yml}
",
    );

    provision_with(&document, &runner, &distro, &console)
        .await
        .expect_err("clone fails");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(flat(&calls[0]), "git clone https://github.com/example/ops.git /opt/ops");
}
