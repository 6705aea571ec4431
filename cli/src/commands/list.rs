//! `convoy list` — show deployments known to the platform, annotated with
//! recorded ports.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::ports::DeploymentRunner;
use crate::infra::compose::ComposeRunner;
use crate::infra::state::RecordStore;

/// Run `convoy list`.
///
/// # Errors
///
/// Returns an error if the platform cannot be queried.
pub async fn run(app: &AppContext) -> Result<()> {
    let ctx = &app.output;

    let runner = ComposeRunner::new(app.runner, app.state_dir.clone());
    let summaries = runner.list().await?;
    if summaries.is_empty() {
        ctx.info("no deployments running");
        return Ok(());
    }

    let records = RecordStore::new(&app.state_dir).load()?;
    ctx.header("deployments");
    for summary in summaries {
        let detail = match records.get(&summary.name) {
            Some(record) => format!("{} — port {}", summary.status, record.main_port),
            None => summary.status.clone(),
        };
        ctx.kv(&summary.name, &detail);
    }
    Ok(())
}
