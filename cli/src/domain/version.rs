//! Ansible version parsing and feature thresholds.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

/// `ansible-pull --diff` first shipped in 2.7.0.
pub const DIFF_FLAG_MIN: Version = Version::new(2, 7, 0);

/// `ansible-pull` accepts several playbooks in one run from 2.12.0.
pub const MULTI_PLAYBOOK_MIN: Version = Version::new(2, 12, 0);

static VERSION_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern — cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"\d+(?:\.\d+)*").expect("valid regex")
});

/// Parse the version out of `ansible-pull --version` output.
///
/// Only the first line is considered, e.g. `ansible-pull [core 2.12.1]` or
/// `ansible-pull 2.9.6`. Missing minor/patch components read as 0 and any
/// components past the third are ignored. Returns `None` when no
/// numeric-dotted token is found.
#[must_use]
pub fn parse_tool_version(output: &str) -> Option<Version> {
    let first_line = output.lines().next()?;
    let token = VERSION_TOKEN_RE.find(first_line)?.as_str();
    let mut parts = token.split('.').map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().transpose().ok()?.unwrap_or(0);
    let patch = parts.next().transpose().ok()?.unwrap_or(0);
    Some(Version::new(major, minor, patch))
}
