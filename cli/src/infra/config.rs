//! Loading the cloud-config document from disk or stdin.

use std::io::Read as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::Value;

/// Path argument that selects stdin instead of a file.
pub const STDIN_PATH: &str = "-";

/// Read and parse a YAML document. `-` reads from stdin.
///
/// An empty document parses as `Value::Null`.
///
/// # Errors
///
/// Returns an error if the source cannot be read or is not valid YAML.
pub fn load_document(path: &Path) -> Result<Value> {
    let (content, origin) = if path.as_os_str() == STDIN_PATH {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("cannot read config from stdin")?;
        (buf, "stdin".to_string())
    } else {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        (content, path.display().to_string())
    };
    parse_document(&content).with_context(|| format!("cannot parse {origin}"))
}

/// Parse YAML text into a document.
///
/// # Errors
///
/// Returns an error if `content` is not valid YAML.
pub fn parse_document(content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_yaml::from_str(content)?)
}
