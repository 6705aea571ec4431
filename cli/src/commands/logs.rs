//! `convoy logs` — stream service logs for a deployment.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::DeploymentRunner;
use crate::infra::compose::ComposeRunner;

#[derive(Args)]
pub struct LogsArgs {
    /// Deployment name (the main agent's name)
    pub name: String,

    /// Restrict output to these agent services
    pub agents: Vec<String>,

    /// Keep following new log output
    #[arg(short, long)]
    pub follow: bool,
}

/// Run `convoy logs`.
///
/// # Errors
///
/// Returns an error if logs cannot be streamed.
pub async fn run(app: &AppContext, args: &LogsArgs) -> Result<()> {
    let runner = ComposeRunner::new(app.runner, app.state_dir.clone());
    runner.logs(&args.name, &args.agents, args.follow).await
}
