//! Core value types flowing through a resolution run.

use std::collections::BTreeMap;

use convoy_common::{AgentManifest, DeploymentOption};

use crate::domain::config::SchedulingHints;

/// Port every agent container listens on inside the deployment network.
pub const INTERNAL_API_PORT: u16 = 8000;

/// One resolved agent: its manifest, the chosen deployment option, and the
/// configuration accumulated across the resolution phases.
///
/// Created by the graph resolver, filled in by the environment engine, then
/// frozen into a [`DeploymentBuildSpec`] by the compiler.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Deployment name, unique within a resolution run.
    pub deployment_name: String,
    pub manifest: AgentManifest,
    /// Reference the manifest was loaded from; relative dependency refs are
    /// resolved against it.
    pub manifest_ref: String,
    /// Index into `manifest.deployment.options`.
    pub selected_option: usize,
    /// Resolved environment for the agent container.
    pub env: BTreeMap<String, String>,
    /// Generated (or configured) agent identifier.
    pub agent_id: String,
    /// Generated (or configured) API credential.
    pub api_key: String,
    /// Fixed external port, when configured. Only meaningful for the main
    /// agent; dependencies are never exposed.
    pub port: Option<u16>,
    /// Platform scheduling hints from the user config, passed through.
    pub scheduling: Option<SchedulingHints>,
}

impl AgentSpec {
    /// The deployment option selected for this agent.
    ///
    /// # Panics
    ///
    /// Never panics for specs produced by the resolver, which validates the
    /// index against the manifest before constructing the spec.
    #[must_use]
    pub fn selected_deployment(&self) -> &DeploymentOption {
        &self.manifest.deployment.options[self.selected_option]
    }
}

/// Terminal artifact for one agent: the spec plus its final image reference
/// and service name. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct DeploymentBuildSpec {
    pub spec: AgentSpec,
    pub image: String,
    pub service_name: String,
}

/// Output of graph resolution: the root agent's name, all specs by
/// deployment name, and the dependency adjacency.
///
/// Agents without dependencies have no adjacency entry at all — callers must
/// treat a missing key as "no dependencies".
#[derive(Debug, Default)]
pub struct ResolvedGraph {
    pub root_name: String,
    pub specs: BTreeMap<String, AgentSpec>,
    pub dependencies: BTreeMap<String, Vec<String>>,
}
