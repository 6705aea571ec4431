//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// Deploy dependent AI agent services from declarative manifests
#[derive(Parser)]
#[command(
    name = "convoy",
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
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Skip interactive prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve an agent manifest and deploy it with its dependencies
    Deploy(commands::deploy::DeployArgs),

    /// Stop a deployment
    Stop(commands::stop::StopArgs),

    /// List deployments
    List,

    /// Show agent logs
    Logs(commands::logs::LogsArgs),

    /// Check host prerequisites
    Check,

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
        let Cli { quiet, no_color, yes, command } = self;
        if matches!(command, Command::Version) {
            commands::version::run();
            return Ok(());
        }

        let app = AppContext::new(&AppFlags { no_color, quiet, yes })?;
        match command {
            Command::Deploy(args) => commands::deploy::run(&app, &args).await,
            Command::Stop(args) => commands::stop::run(&app, &args).await,
            Command::List => commands::list::run(&app).await,
            Command::Logs(args) => commands::logs::run(&app, &args).await,
            Command::Check => commands::check::run(&app).await,
            Command::Version => Ok(()),
        }
    }
}
