//! Domain types and validator for the `ansible` configuration section.
//!
//! Pure functions only — no I/O, no async, no filesystem access.
//! [`parse_config`] walks the raw YAML once, stops at the first violation
//! and otherwise returns immutable value types that the workflows consume.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Value};

use crate::domain::error::{ValidationError, ValidationKind};

// ── Constants ────────────────────────────────────────────────────────────────

/// Top-level key of the section in a cloud-config document.
pub const SECTION_KEY: &str = "ansible";

pub const REQUIRED_KEYS: &[&str] = &["install_method", "package_name"];
pub const VALID_INSTALL_METHODS: &[&str] = &["pip", "distro"];

const PULL_RESERVED_KEYS: &[&str] = &["url", "playbook_name", "playbook_names"];
const RUN_RESERVED_KEYS: &[&str] = &["playbook_dir", "playbook_name"];

static NULL: Value = Value::Null;

// ── Config schema ────────────────────────────────────────────────────────────

/// How Ansible gets onto the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// Distribution package manager.
    #[default]
    Distro,
    /// `python3 -m pip`, into the user site when a run user is set.
    Pip,
}

/// Validated `ansible` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnsibleConfig {
    pub install_method: InstallMethod,
    pub package_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub galaxy: Option<GalaxySpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pull: Vec<PullSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_controller: Option<ControllerSpec>,
}

/// `ansible-galaxy` (or any other) commands run verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalaxySpec {
    pub actions: Vec<Vec<String>>,
}

/// One `ansible-pull` work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullSpec {
    pub url: String,
    #[serde(flatten)]
    pub playbooks: Playbooks,
    #[serde(flatten)]
    pub options: OptionBag,
}

/// Either a single playbook or an ordered, non-empty list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Playbooks {
    #[serde(rename = "playbook_name")]
    Single(String),
    #[serde(rename = "playbook_names")]
    Many(Vec<String>),
}

impl Playbooks {
    /// Playbook names in document order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(name) => vec![name.as_str()],
            Self::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Repositories to clone and playbooks to run on a controller node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSpec {
    pub repositories: Vec<Repository>,
    pub run_ansible: Vec<PlaybookRun>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    pub source: String,
    pub path: String,
}

/// One `ansible-playbook` run inside a cloned repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybookRun {
    pub playbook_dir: String,
    pub playbook_name: String,
    #[serde(flatten)]
    pub options: OptionBag,
}

/// A single option value as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Number(serde_yaml::Number),
    Value(String),
}

/// Ordered option-bag; keys keep their document spelling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionBag(Vec<(String, OptionValue)>);

impl OptionBag {
    #[must_use]
    pub fn new(entries: Vec<(String, OptionValue)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `key` is present with a truthy value: `true`, a non-zero
    /// number or a non-empty string.
    #[must_use]
    pub fn is_enabled(&self, key: &str) -> bool {
        self.0.iter().any(|(k, v)| {
            k == key
                && match v {
                    OptionValue::Flag(b) => *b,
                    OptionValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                    OptionValue::Value(s) => !s.is_empty(),
                }
        })
    }
}

impl Serialize for OptionBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ── Validator ────────────────────────────────────────────────────────────────

/// The `ansible` section of a document, or `None` when it is absent or empty.
#[must_use]
pub fn section(document: &Value) -> Option<&Value> {
    document.get(SECTION_KEY).filter(|v| truthy(v))
}

/// Validate the raw `ansible` section and build the typed config.
///
/// Rules are applied in a fixed order and the first violation is returned:
/// required keys and install method, scalar settings, `galaxy`, `pull`,
/// then `setup_controller`.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first violation found.
pub fn parse_config(section: &Value) -> Result<AnsibleConfig, ValidationError> {
    let Some(map) = section.as_mapping() else {
        return Err(shape(
            section,
            format!(
                "Invalid value {SECTION_KEY}. Expected dict but found {}",
                flow(section)
            ),
        ));
    };

    for key in REQUIRED_KEYS {
        if !map.get(*key).is_some_and(truthy) {
            return Err(missing(
                section,
                format!("Missing required key '{key}' from {}", flow(section)),
            ));
        }
    }

    let install_method = match map.get("install_method").and_then(Value::as_str) {
        Some("pip") => InstallMethod::Pip,
        Some("distro") => InstallMethod::Distro,
        _ => {
            let value = map.get("install_method").unwrap_or(&NULL);
            return Err(invalid(
                section,
                format!(
                    "Invalid install method {}. Expected one of: {}",
                    flow(value),
                    VALID_INSTALL_METHODS.join(", ")
                ),
            ));
        }
    };

    let package_name = required_string(map, "package_name", section)?;
    let run_user = optional_string(map, "run_user", section)?;
    let ansible_config = optional_string(map, "ansible_config", section)?;
    let galaxy = parse_galaxy(map.get("galaxy"))?;
    let pull = parse_pull(map.get("pull"))?;
    let setup_controller = parse_controller(map.get("setup_controller"))?;

    Ok(AnsibleConfig {
        install_method,
        package_name,
        run_user,
        ansible_config,
        galaxy,
        pull,
        setup_controller,
    })
}

fn parse_galaxy(value: Option<&Value>) -> Result<Option<GalaxySpec>, ValidationError> {
    let Some(value) = value.filter(|v| truthy(v)) else {
        return Ok(None);
    };
    let Some(map) = value.as_mapping() else {
        return Err(shape(
            value,
            format!("Invalid value ansible.galaxy. Expected dict but found {}", flow(value)),
        ));
    };

    let mut actions = Vec::new();
    if let Some(raw) = map.get("actions").filter(|v| truthy(v)) {
        let Some(items) = raw.as_sequence() else {
            return Err(shape(
                value,
                format!(
                    "Invalid value ansible.galaxy.actions. Expected a list of commands but found {}",
                    flow(raw)
                ),
            ));
        };
        for item in items {
            let argv = item
                .as_sequence()
                .filter(|argv| !argv.is_empty())
                .and_then(|argv| argv.iter().map(scalar_text).collect::<Option<Vec<_>>>());
            let Some(argv) = argv else {
                return Err(shape(
                    value,
                    format!(
                        "Invalid galaxy action {}. Expected a non-empty list of strings",
                        flow(item)
                    ),
                ));
            };
            actions.push(argv);
        }
    }
    Ok(Some(GalaxySpec { actions }))
}

fn parse_pull(value: Option<&Value>) -> Result<Vec<PullSpec>, ValidationError> {
    let Some(value) = value.filter(|v| truthy(v)) else {
        return Ok(Vec::new());
    };
    let items: Vec<&Value> = match value {
        Value::Mapping(_) => vec![value],
        Value::Sequence(seq) => seq.iter().collect(),
        _ => {
            return Err(shape(
                value,
                format!(
                    "Invalid value ansible.pull. Expected either dict or list of dicts but found {}",
                    flow(value)
                ),
            ));
        }
    };
    items.into_iter().map(parse_pull_item).collect()
}

fn parse_pull_item(item: &Value) -> Result<PullSpec, ValidationError> {
    let Some(map) = item.as_mapping() else {
        return Err(shape(
            item,
            format!("Invalid value of ansible.pull. Expected dict but found {}", flow(item)),
        ));
    };

    if !map.get("url").is_some_and(truthy) {
        return Err(missing(
            item,
            format!("Missing required key 'url' from {}", flow(item)),
        ));
    }

    let has_playbook = map.get("playbook_name").is_some_and(truthy);
    let has_playbooks = map.get("playbook_names").is_some_and(truthy);
    let playbooks = match (has_playbook, has_playbooks) {
        (false, false) => {
            return Err(missing(
                item,
                format!("Missing required key 'playbook_names' from {}", flow(item)),
            ));
        }
        (true, true) => {
            return Err(ValidationError::new(
                ValidationKind::MutuallyExclusive,
                flow(item),
                format!(
                    "Key 'ansible.pull.playbook_name' and 'ansible.pull.playbook_names' are \
                     mutually exclusive. Please use 'playbook_names' in {}",
                    flow(item)
                ),
            ));
        }
        (true, false) => Playbooks::Single(required_string(map, "playbook_name", item)?),
        (false, true) => Playbooks::Many(string_list(map, "playbook_names", item)?),
    };

    Ok(PullSpec {
        url: required_string(map, "url", item)?,
        playbooks,
        options: parse_options(map, PULL_RESERVED_KEYS, item)?,
    })
}

fn parse_controller(value: Option<&Value>) -> Result<Option<ControllerSpec>, ValidationError> {
    let Some(value) = value.filter(|v| truthy(v)) else {
        return Ok(None);
    };
    let Some(map) = value.as_mapping() else {
        return Err(shape(
            value,
            format!(
                "Invalid value ansible.setup_controller. Expected dict but found {}",
                flow(value)
            ),
        ));
    };

    let repositories = map.get("repositories").filter(|v| truthy(v));
    let runs = map.get("run_ansible").filter(|v| truthy(v));
    if repositories.is_none() && runs.is_none() {
        return Err(missing(
            value,
            format!(
                "Missing required key 'repositories' or 'run_ansible' from {}",
                flow(value)
            ),
        ));
    }

    let repositories = mapping_list(repositories, "ansible.setup_controller.repositories")?
        .into_iter()
        .map(|(repo, item)| {
            Ok(Repository {
                source: required_string(repo, "source", item)?,
                path: required_string(repo, "path", item)?,
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    let run_ansible = mapping_list(runs, "ansible.setup_controller.run_ansible")?
        .into_iter()
        .map(|(run, item)| {
            Ok(PlaybookRun {
                playbook_dir: required_string(run, "playbook_dir", item)?,
                playbook_name: required_string(run, "playbook_name", item)?,
                options: parse_options(run, RUN_RESERVED_KEYS, item)?,
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    Ok(Some(ControllerSpec {
        repositories,
        run_ansible,
    }))
}

// ── Field helpers ────────────────────────────────────────────────────────────

fn mapping_list<'a>(
    value: Option<&'a Value>,
    path: &str,
) -> Result<Vec<(&'a Mapping, &'a Value)>, ValidationError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Some(items) = value.as_sequence() else {
        return Err(shape(
            value,
            format!("Invalid value {path}. Expected a list of dicts but found {}", flow(value)),
        ));
    };
    items
        .iter()
        .map(|item| match item.as_mapping() {
            Some(map) => Ok((map, item)),
            None => Err(shape(
                item,
                format!("Invalid value of {path}. Expected dict but found {}", flow(item)),
            )),
        })
        .collect()
}

fn required_string(map: &Mapping, key: &str, ctx: &Value) -> Result<String, ValidationError> {
    match map.get(key) {
        Some(v) if truthy(v) => v.as_str().map(str::to_string).ok_or_else(|| {
            invalid(
                ctx,
                format!("Invalid value for '{key}': expected a string but found {}", flow(v)),
            )
        }),
        _ => Err(missing(
            ctx,
            format!("Missing required key '{key}' from {}", flow(ctx)),
        )),
    }
}

fn optional_string(
    map: &Mapping,
    key: &str,
    ctx: &Value,
) -> Result<Option<String>, ValidationError> {
    match map.get(key) {
        Some(v) if truthy(v) => required_string(map, key, ctx).map(Some),
        _ => Ok(None),
    }
}

fn string_list(map: &Mapping, key: &str, ctx: &Value) -> Result<Vec<String>, ValidationError> {
    let value = map.get(key).unwrap_or(&NULL);
    value
        .as_sequence()
        .and_then(|seq| {
            seq.iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| {
            shape(
                ctx,
                format!(
                    "Invalid value for '{key}': expected a list of strings but found {}",
                    flow(value)
                ),
            )
        })
}

fn parse_options(
    map: &Mapping,
    reserved: &[&str],
    ctx: &Value,
) -> Result<OptionBag, ValidationError> {
    let mut entries = Vec::new();
    for (key, value) in map {
        let Some(key) = key.as_str() else {
            return Err(invalid(
                ctx,
                format!("Invalid option key {} in {}", flow(key), flow(ctx)),
            ));
        };
        if reserved.contains(&key) {
            continue;
        }
        let value = match value {
            Value::Bool(b) => OptionValue::Flag(*b),
            Value::String(s) => OptionValue::Value(s.clone()),
            Value::Number(n) => OptionValue::Number(n.clone()),
            other => {
                return Err(invalid(
                    ctx,
                    format!(
                        "Invalid value for option '{key}': expected a boolean, string or \
                         number but found {}",
                        flow(other)
                    ),
                ));
            }
        };
        entries.push((key.to_string(), value));
    }
    Ok(OptionBag::new(entries))
}

/// YAML truthiness: null, `false`, zero, empty strings and empty containers are falsy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => truthy(&tagged.value),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a value on one line, `{key: value, ...}` / `[a, b]` style.
pub fn flow(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(seq) => {
            let items: Vec<String> = seq.iter().map(flow).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(map) => {
            let items: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", flow(k), flow(v)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        Value::Tagged(tagged) => format!("{} {}", tagged.tag, flow(&tagged.value)),
    }
}

fn missing(ctx: &Value, message: String) -> ValidationError {
    ValidationError::new(ValidationKind::MissingKey, flow(ctx), message)
}

fn invalid(ctx: &Value, message: String) -> ValidationError {
    ValidationError::new(ValidationKind::InvalidValue, flow(ctx), message)
}

fn shape(ctx: &Value, message: String) -> ValidationError {
    ValidationError::new(ValidationKind::InvalidShape, flow(ctx), message)
}

// ── Unit tests ───────────────────────────────────────────────────────────────
