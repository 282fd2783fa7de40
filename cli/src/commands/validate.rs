//! Validate command: check the `ansible` section without running anything.

use anyhow::{Context, Result};

use crate::commands::ConfigArgs;
use crate::domain::config::{self, parse_config};
use crate::infra::config::load_document;
use crate::output::OutputContext;

/// Run the validate command.
///
/// Prints the normalized section as YAML, then a status line.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or the section is
/// invalid.
pub fn run(ctx: &OutputContext, args: &ConfigArgs) -> Result<()> {
    let document = load_document(&args.config)?;
    let Some(section) = config::section(&document) else {
        ctx.warn(&format!(
            "No '{}' section, nothing to validate",
            config::SECTION_KEY
        ));
        return Ok(());
    };
    let cfg = parse_config(section)?;
    if !ctx.quiet {
        let rendered = serde_yaml::to_string(&cfg).context("cannot serialize config")?;
        print!("{rendered}");
    }
    ctx.success("Configuration is valid");
    Ok(())
}
