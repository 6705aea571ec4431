//! `ImageStore` implementation over the `docker` CLI.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::application::ports::{CommandRunner, ImageStore, PullOutcome, SourcePayload};
use crate::infra::command_runner::stderr_of;
use crate::infra::fs::copy_dir_recursive;

/// Dockerfile used to package an agent source tree on top of the base image.
const AGENT_DOCKERFILE: &str = include_str!("assets/agent.Dockerfile");

/// Registry phrases that mean "the image does not exist" rather than a
/// transient failure.
const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "manifest unknown",
    "repository does not exist",
    "pull access denied",
];

/// Production image store driving the local docker daemon.
pub struct DockerImageStore<R: CommandRunner> {
    runner: R,
    delete_build_folders: bool,
}

impl<R: CommandRunner> DockerImageStore<R> {
    #[must_use]
    pub fn new(runner: R, delete_build_folders: bool) -> Self {
        Self {
            runner,
            delete_build_folders,
        }
    }
}

impl<R: CommandRunner> ImageStore for DockerImageStore<R> {
    async fn list_images(&self, reference: &str) -> Result<Vec<String>> {
        let filter = format!("reference={reference}");
        let output = self
            .runner
            .run(
                "docker",
                &[
                    "image",
                    "ls",
                    "--format",
                    "{{.Repository}}:{{.Tag}}",
                    "--filter",
                    &filter,
                ],
            )
            .await
            .context("listing images")?;
        if !output.status.success() {
            bail!("docker image ls failed: {}", stderr_of(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }

    async fn pull_image(&self, reference: &str) -> Result<PullOutcome> {
        let output = self
            .runner
            .run("docker", &["pull", reference])
            .await
            .with_context(|| format!("pulling image '{reference}'"))?;
        if output.status.success() {
            return Ok(PullOutcome::Pulled);
        }
        let stderr = stderr_of(&output).to_lowercase();
        if NOT_FOUND_MARKERS.iter().any(|marker| stderr.contains(marker)) {
            return Ok(PullOutcome::NotFound);
        }
        bail!("docker pull '{reference}' failed: {stderr}");
    }

    async fn build_image(
        &self,
        tag: &str,
        payload: &SourcePayload,
        base_image: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<()> {
        let workspace = tempfile::Builder::new()
            .prefix("convoy_build_")
            .tempdir()
            .context("creating temporary build workspace")?;

        stage_build_workspace(workspace.path(), &payload.root)
            .context("staging build workspace")?;

        let base_arg = format!("BASE_IMAGE={base_image}");
        let context_dir = workspace.path().to_string_lossy().into_owned();
        let mut args: Vec<String> = vec![
            "build".into(),
            "--tag".into(),
            tag.into(),
            "--build-arg".into(),
            base_arg,
            "--build-arg".into(),
            "AGENT_DIR=agent_src".into(),
        ];
        for (key, value) in build_args {
            args.push("--build-arg".into());
            args.push(format!("{key}={value}"));
        }
        args.push(context_dir);

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run("docker", &arg_refs)
            .await
            .with_context(|| format!("building image '{tag}'"))?;

        // Build workspaces are kept for debugging when requested; the
        // tempdir otherwise removes itself on drop, on every exit path.
        if !self.delete_build_folders {
            let kept = workspace.keep();
            eprintln!("build workspace kept at {}", kept.display());
        }

        if !output.status.success() {
            bail!("docker build '{tag}' failed: {}", stderr_of(&output));
        }
        Ok(())
    }
}

/// Copy the agent source into the workspace and write the build Dockerfile.
fn stage_build_workspace(workspace: &Path, source_root: &Path) -> Result<()> {
    copy_dir_recursive(source_root, &workspace.join("agent_src"))?;
    std::fs::write(workspace.join("Dockerfile"), AGENT_DOCKERFILE)
        .context("writing Dockerfile to build workspace")?;
    Ok(())
}
