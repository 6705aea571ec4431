use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::EnvVarValues;

/// Agent manifest — the declarative description of one deployable agent.
///
/// Parses from JSON or YAML; all convoy tooling goes through this type and
/// never touches the raw document again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentManifest {
    pub metadata: ManifestMetadata,
    pub deployment: DeploymentSpec,
}

/// Metadata section of an agent manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(rename = "ref")]
    pub reference: AgentRef,
    #[serde(default)]
    pub description: Option<String>,
}

/// Name, version and optional record URL identifying an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRef {
    pub name: String,
    pub version: String,
    /// URL of the record. Can be a network location, a content-addressed
    /// digest or a file path.
    #[serde(default)]
    pub url: Option<String>,
}

/// Deployment section: how the agent can be run, what it needs, and which
/// other agents it depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSpec {
    #[serde(rename = "deployment_options", default)]
    pub options: Vec<DeploymentOption>,
    #[serde(rename = "env_vars", default)]
    pub env_vars: Vec<EnvVarDef>,
    #[serde(default)]
    pub dependencies: Vec<AgentDependency>,
}

/// One way an agent can be deployed: a prebuilt container image or source
/// code that convoy builds into one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentOption {
    Docker(ImageDeployment),
    SourceCode(SourceDeployment),
}

impl DeploymentOption {
    /// Optional human-chosen label for selecting this option.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Docker(d) => d.name.as_deref(),
            Self::SourceCode(s) => s.name.as_deref(),
        }
    }
}

/// Prebuilt image deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDeployment {
    #[serde(default)]
    pub name: Option<String>,
    pub image: String,
}

/// Buildable source deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDeployment {
    #[serde(default)]
    pub name: Option<String>,
    /// Location of the agent source tree, resolved relative to the manifest
    /// when not absolute.
    pub url: String,
    #[serde(rename = "framework_config")]
    pub framework: FrameworkConfig,
}

/// Framework the agent source is written against. Drives build arguments and
/// the runtime entrypoint reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "framework", rename_all = "snake_case")]
pub enum FrameworkConfig {
    Langgraph { graph: String },
    Llamaindex { path: String },
}

impl FrameworkConfig {
    /// Framework identifier as exposed to the agent container.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Langgraph { .. } => "langgraph",
            Self::Llamaindex { .. } => "llamaindex",
        }
    }

    /// The framework-specific entrypoint reference (graph or module path).
    #[must_use]
    pub fn entrypoint(&self) -> &str {
        match self {
            Self::Langgraph { graph } => graph,
            Self::Llamaindex { path } => path,
        }
    }
}

/// Declared environment variable of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "default", default)]
    pub default_value: Option<String>,
}

/// Declared dependency on another agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDependency {
    /// Deployment name the dependency will run under.
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: AgentRef,
    /// Preferred deployment option of the dependency, by option name.
    #[serde(default)]
    pub deployment_option: Option<String>,
    /// Environment overrides scoped to this dependency (and recursively to
    /// its own dependencies).
    #[serde(default)]
    pub env_var_values: Option<EnvVarValues>,
}

/// Structural manifest problems. All are fatal for a resolution run.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid agent manifest: no name found in manifest")]
    MissingName,

    #[error("invalid agent manifest: no version found in manifest")]
    MissingVersion,

    #[error("invalid agent manifest: no deployment option found in manifest")]
    NoDeploymentOptions,

    #[error("invalid agent manifest: deployment option '{0}' not found")]
    OptionNotFound(String),
}

impl AgentManifest {
    /// Check the structural invariants every manifest must satisfy before
    /// resolution may use it.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.metadata.reference.name.is_empty() {
            return Err(ManifestError::MissingName);
        }
        if self.metadata.reference.version.is_empty() {
            return Err(ManifestError::MissingVersion);
        }
        if self.deployment.options.is_empty() {
            return Err(ManifestError::NoDeploymentOptions);
        }
        Ok(())
    }

    /// Index of the deployment option with the given name, or 0 when no name
    /// is requested.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::OptionNotFound`] when a name is requested but
    /// no option carries it.
    pub fn option_index(&self, requested: Option<&str>) -> Result<usize, ManifestError> {
        let Some(requested) = requested.filter(|r| !r.is_empty()) else {
            return Ok(0);
        };
        self.deployment
            .options
            .iter()
            .position(|opt| opt.name() == Some(requested))
            .ok_or_else(|| ManifestError::OptionNotFound(requested.to_owned()))
    }
}
