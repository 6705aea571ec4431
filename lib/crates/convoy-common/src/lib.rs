//! Shared types for convoy — the agent manifest model and the recursive
//! environment value document exchanged between the CLI and its tooling.

pub mod manifest;
pub mod values;

pub use manifest::{
    AgentDependency, AgentManifest, AgentRef, DeploymentOption, DeploymentSpec, EnvVarDef,
    FrameworkConfig, ImageDeployment, ManifestError, ManifestMetadata, SourceDeployment,
};
pub use values::{DependencyEnvVarValues, EnvVarValues};
