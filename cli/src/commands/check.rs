//! `convoy check` — verify host prerequisites for deploying agents.

use anyhow::{Result, bail};

use crate::app::AppContext;
use crate::application::ports::CommandRunner;

/// Run `convoy check`.
///
/// # Errors
///
/// Returns an error when any prerequisite is missing.
pub async fn run(app: &AppContext) -> Result<()> {
    let ctx = &app.output;
    let checks: [(&str, &[&str]); 3] = [
        ("docker CLI", &["version", "--format", "{{.Client.Version}}"]),
        ("docker daemon", &["info", "--format", "{{.ServerVersion}}"]),
        ("docker compose plugin", &["compose", "version", "--short"]),
    ];

    let mut failed = false;
    for (label, args) in checks {
        match app.runner.run("docker", args).await {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_owned();
                ctx.success(&format!("{label}: {version}"));
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
                ctx.error(&format!("{label}: {stderr}"));
                failed = true;
            }
            Err(err) => {
                ctx.error(&format!("{label}: {err:#}"));
                failed = true;
            }
        }
    }

    if failed {
        bail!("prerequisite checks failed");
    }
    ctx.success("all prerequisite checks passed");
    Ok(())
}
