//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Output};

use anyhow::Result;
use convoy_common::AgentManifest;

use crate::domain::DeploymentBuildSpec;

// ── Value Types ───────────────────────────────────────────────────────────────

/// An agent source tree, materialized on the local filesystem and scanned.
///
/// `files` holds `(relative path, byte size)` pairs for every regular file
/// under `root`, sorted by relative path. The build cache fingerprints this
/// listing; the image store ships `root` as the build context.
#[derive(Debug, Clone)]
pub struct SourcePayload {
    pub root: PathBuf,
    pub files: Vec<(String, u64)>,
}

/// Outcome of pulling an image from a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Pulled,
    NotFound,
}

/// One running (or stopped) deployment as reported by the platform.
#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub name: String,
    pub status: String,
}

// ── Manifest Source Port ──────────────────────────────────────────────────────

/// Loads an agent manifest from a reference string (file path, HTTP(S) URL,
/// or content-addressed digest). The resolver never inspects the reference
/// scheme itself.
#[allow(async_fn_in_trait)]
pub trait ManifestSource {
    /// Load and parse the manifest at `reference`.
    async fn load(&self, reference: &str) -> Result<AgentManifest>;
}

// ── Image Store Port ──────────────────────────────────────────────────────────

/// Container image operations against the target image store.
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    /// References of images matching `reference` on the runtime host.
    async fn list_images(&self, reference: &str) -> Result<Vec<String>>;

    /// Pull `reference` from its registry. `NotFound` is a distinct outcome,
    /// not an error.
    async fn pull_image(&self, reference: &str) -> Result<PullOutcome>;

    /// Build `tag` from the payload on top of `base_image`, passing
    /// `build_args` through to the build.
    async fn build_image(
        &self,
        tag: &str,
        payload: &SourcePayload,
        base_image: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<()>;
}

// ── Deployment Runner Port ────────────────────────────────────────────────────

/// Applies a compiled deployment to the target platform and manages its
/// lifecycle.
#[allow(async_fn_in_trait)]
pub trait DeploymentRunner {
    /// Provision and start every service in `specs` as one batch. In dry-run
    /// mode, return the rendered deployment artifact instead of applying.
    async fn apply(
        &self,
        main_agent: &str,
        specs: &BTreeMap<String, DeploymentBuildSpec>,
        dependencies: &BTreeMap<String, Vec<String>>,
        dry_run: bool,
    ) -> Result<Option<Vec<u8>>>;

    /// Tear down the named deployment.
    async fn remove(&self, deployment: &str) -> Result<()>;

    /// Stream logs for the named deployment, optionally restricted to the
    /// given agent services.
    async fn logs(&self, deployment: &str, agents: &[String], follow: bool) -> Result<()>;

    /// Deployments currently known to the platform.
    async fn list(&self) -> Result<Vec<DeploymentSummary>>;
}

// ── Port Probe Port ───────────────────────────────────────────────────────────

/// Host port discovery for the main agent's external binding.
#[allow(async_fn_in_trait)]
pub trait PortProbe {
    /// Published host port of `service` in `deployment`, when such a service
    /// is already running.
    async fn running_service_port(&self, deployment: &str, service: &str) -> Result<Option<u16>>;

    /// A free ephemeral port on the host.
    async fn free_port(&self) -> Result<u16>;
}

// ── Source Fetcher Port ───────────────────────────────────────────────────────

/// Materializes an agent's source tree for building.
#[allow(async_fn_in_trait)]
pub trait SourceFetcher {
    /// Resolve `source_url` (relative references are resolved against the
    /// manifest's location) and scan the resulting tree.
    async fn fetch(&self, manifest_ref: &str, source_url: &str) -> Result<SourcePayload>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Run a program with inherited stdio (streaming output to the user) and
    /// return only its exit status.
    async fn run_streaming(&self, program: &str, args: &[&str]) -> Result<ExitStatus>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

/// Reporter that discards everything. Used by tests and non-interactive runs.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn step(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
