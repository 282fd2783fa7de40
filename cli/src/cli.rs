//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::output::OutputContext;

/// First-boot provisioning with Ansible
#[derive(Parser)]
#[command(
    name = "ansible-bootstrap",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install Ansible and run the configured galaxy, pull and playbook steps
    Run(commands::run::RunArgs),

    /// Check the `ansible` section without running anything
    Validate(commands::ConfigArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            quiet,
            no_color,
            command,
        } = self;
        let ctx = OutputContext::new(no_color, quiet);
        match command {
            Command::Run(args) => commands::run::run(&ctx, &args).await,
            Command::Validate(args) => commands::validate::run(&ctx, &args),
            Command::Version => {
                commands::version::run();
                Ok(())
            }
        }
    }
}
