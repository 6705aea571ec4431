//! Infrastructure implementation of the `CommandRunner` port.

use std::process::{ExitStatus, Output, Stdio};

use anyhow::{Context, Result};

use crate::application::ports::CommandRunner;

/// Production `CommandRunner` — tokio async process execution. Children are
/// killed when their future is dropped so no orphans outlive a canceled run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait_with_output()
            .await
            .with_context(|| format!("failed to run {program}"))
    }

    async fn run_streaming(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("failed to run {program}"))
    }
}

/// Render a failed command's stderr into an error message tail.
#[must_use]
pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}
