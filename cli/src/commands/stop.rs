//! `convoy stop` — tear down a deployment, preserving per-agent storage.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::DeploymentRunner;
use crate::infra::compose::ComposeRunner;
use crate::infra::state::RecordStore;

#[derive(Args)]
pub struct StopArgs {
    /// Deployment name (the main agent's name)
    pub name: String,
}

/// Run `convoy stop`.
///
/// # Errors
///
/// Returns an error if the deployment cannot be stopped.
pub async fn run(app: &AppContext, args: &StopArgs) -> Result<()> {
    let ctx = &app.output;

    if !app.confirm(&format!("Stop deployment '{}'?", args.name), true)? {
        ctx.info("aborted");
        return Ok(());
    }

    let runner = ComposeRunner::new(app.runner, app.state_dir.clone());
    runner.remove(&args.name).await?;
    RecordStore::new(&app.state_dir).remove(&args.name)?;

    ctx.success(&format!("deployment '{}' stopped", args.name));
    ctx.info("agent storage is preserved under the convoy state directory");
    Ok(())
}
