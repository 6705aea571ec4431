//! Environment resolution — applies the layered precedence rule to every
//! resolved agent and validates required variables.
//!
//! Layer order, later wins: manifest-declared variables found in the process
//! environment, prefixed process-environment variables, declared variables
//! found in the override file, prefixed override-file variables, the config
//! entry's explicit map. Manifest defaults fill in last, only for variables
//! still absent.

use std::collections::BTreeMap;

use crate::domain::ResolvedGraph;
use crate::domain::config::ConfigFile;
use crate::domain::env::{
    env_var_prefix, fill_defaults, missing_required, set_declared_from, set_prefixed_from,
};
use crate::domain::error::EnvError;

/// The two ambient value sources consulted by the precedence layers.
pub struct EnvLayers<'a> {
    pub process_env: &'a BTreeMap<String, String>,
    pub file_values: &'a BTreeMap<String, String>,
}

/// Apply config identity and all environment layers to every agent spec.
pub fn apply_config(graph: &mut ResolvedGraph, config: &ConfigFile, layers: &EnvLayers<'_>) {
    for (name, spec) in &mut graph.specs {
        let entry = config.config.get(name).cloned().unwrap_or_default();
        spec.agent_id = entry.id.unwrap_or_default();
        spec.api_key = entry.api_key.unwrap_or_default();
        spec.port = entry.port;
        spec.scheduling = entry.scheduling;

        let declared = spec.manifest.deployment.env_vars.clone();
        let prefix = env_var_prefix(name);

        set_declared_from(&mut spec.env, &declared, layers.process_env);
        set_prefixed_from(&mut spec.env, &prefix, layers.process_env);
        set_declared_from(&mut spec.env, &declared, layers.file_values);
        set_prefixed_from(&mut spec.env, &prefix, layers.file_values);
        for (key, value) in &entry.env_vars {
            spec.env.insert(key.clone(), value.clone());
        }
        fill_defaults(&mut spec.env, &declared);
    }
}

/// Collect every missing required variable across all agents. Errors are
/// batched, not short-circuited, so one pass reports everything.
#[must_use]
pub fn validate_env_vars(graph: &ResolvedGraph) -> Vec<EnvError> {
    let mut errors = Vec::new();
    for (name, spec) in &graph.specs {
        for var in missing_required(&spec.env, &spec.manifest.deployment.env_vars) {
            errors.push(EnvError::MissingRequired {
                agent: name.clone(),
                var,
            });
        }
    }
    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use convoy_common::{
        AgentManifest, AgentRef, DeploymentOption, DeploymentSpec, EnvVarDef, ImageDeployment,
        ManifestMetadata,
    };

    use super::*;
    use crate::domain::AgentSpec;
    use crate::domain::config::AgentConfig;

    fn env_var(name: &str, required: bool, default: Option<&str>) -> EnvVarDef {
        EnvVarDef {
            name: name.to_owned(),
            description: None,
            required,
            default_value: default.map(str::to_owned),
        }
    }

    fn graph_with_agent(name: &str, env_vars: Vec<EnvVarDef>) -> ResolvedGraph {
        let mut graph = ResolvedGraph {
            root_name: name.to_owned(),
            ..ResolvedGraph::default()
        };
        graph.specs.insert(
            name.to_owned(),
            AgentSpec {
                deployment_name: name.to_owned(),
                manifest: AgentManifest {
                    metadata: ManifestMetadata {
                        reference: AgentRef {
                            name: name.to_owned(),
                            version: "0.1.0".to_owned(),
                            url: None,
                        },
                        description: None,
                    },
                    deployment: DeploymentSpec {
                        options: vec![DeploymentOption::Docker(ImageDeployment {
                            name: None,
                            image: "ghcr.io/example/x:1".to_owned(),
                        })],
                        env_vars,
                        dependencies: vec![],
                    },
                },
                manifest_ref: format!("{name}.json"),
                selected_option: 0,
                env: BTreeMap::new(),
                agent_id: String::new(),
                api_key: String::new(),
                port: None,
                scheduling: None,
            },
        );
        graph
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn config_with_env(agent: &str, env: &[(&str, &str)]) -> ConfigFile {
        let mut config = ConfigFile::default();
        config.config.insert(
            agent.to_owned(),
            AgentConfig {
                id: Some("id-1".to_owned()),
                api_key: Some("key-1".to_owned()),
                port: None,
                env_vars: map(env),
                scheduling: None,
            },
        );
        config
    }

    // ── Precedence ───────────────────────────────────────────────────────────

    #[test]
    fn config_entry_beats_every_other_layer() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("V", false, Some("default"))]);
        let process = map(&[("V", "proc-declared"), ("AGENT_A_V", "proc-prefixed")]);
        let file = map(&[("V", "file-declared"), ("AGENT_A_V", "file-prefixed")]);
        let config = config_with_env("agent-a", &[("V", "from-config")]);

        apply_config(
            &mut graph,
            &config,
            &EnvLayers { process_env: &process, file_values: &file },
        );
        assert_eq!(
            graph.specs["agent-a"].env.get("V").map(String::as_str),
            Some("from-config")
        );
    }

    #[test]
    fn file_layers_beat_process_layers() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("V", false, None)]);
        let process = map(&[("V", "proc-declared"), ("AGENT_A_V", "proc-prefixed")]);
        let file = map(&[("V", "file-declared")]);

        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &process, file_values: &file },
        );
        assert_eq!(
            graph.specs["agent-a"].env.get("V").map(String::as_str),
            Some("file-declared")
        );
    }

    #[test]
    fn prefixed_file_var_beats_declared_file_var() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("V", false, None)]);
        let file = map(&[("V", "file-declared"), ("AGENT_A_V", "file-prefixed")]);

        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &BTreeMap::new(), file_values: &file },
        );
        assert_eq!(
            graph.specs["agent-a"].env.get("V").map(String::as_str),
            Some("file-prefixed")
        );
    }

    #[test]
    fn prefixed_process_var_beats_declared_process_var() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("V", false, None)]);
        let process = map(&[("V", "proc-declared"), ("AGENT_A_V", "proc-prefixed")]);

        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &process, file_values: &BTreeMap::new() },
        );
        assert_eq!(
            graph.specs["agent-a"].env.get("V").map(String::as_str),
            Some("proc-prefixed")
        );
    }

    #[test]
    fn explicit_value_beats_manifest_default() {
        // A required var with default "y" set to "x" by the lowest layer
        // resolves to "x" — the default is strictly last-resort.
        let mut graph = graph_with_agent("agent-a", vec![env_var("TOKEN", true, Some("y"))]);
        let process = map(&[("TOKEN", "x")]);

        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &process, file_values: &BTreeMap::new() },
        );
        assert_eq!(
            graph.specs["agent-a"].env.get("TOKEN").map(String::as_str),
            Some("x")
        );
    }

    #[test]
    fn default_fills_when_no_layer_sets_the_variable() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("LEVEL", true, Some("info"))]);

        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &BTreeMap::new(), file_values: &BTreeMap::new() },
        );
        assert_eq!(
            graph.specs["agent-a"].env.get("LEVEL").map(String::as_str),
            Some("info")
        );
        // Filled by default → no validation error.
        assert!(validate_env_vars(&graph).is_empty());
    }

    #[test]
    fn resolution_is_deterministic_and_idempotent() {
        let process = map(&[("AGENT_A_V", "1")]);
        let file = map(&[("W", "2")]);
        let declared = vec![env_var("V", false, None), env_var("W", false, None)];

        let mut first = graph_with_agent("agent-a", declared.clone());
        apply_config(
            &mut first,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &process, file_values: &file },
        );
        let snapshot = first.specs["agent-a"].env.clone();

        // Applying again over the already-resolved state changes nothing.
        apply_config(
            &mut first,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &process, file_values: &file },
        );
        assert_eq!(first.specs["agent-a"].env, snapshot);

        // A fresh run over identical inputs yields the identical map.
        let mut second = graph_with_agent("agent-a", declared);
        apply_config(
            &mut second,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &process, file_values: &file },
        );
        assert_eq!(second.specs["agent-a"].env, snapshot);
    }

    // ── Validation ───────────────────────────────────────────────────────────

    #[test]
    fn missing_required_var_is_reported_with_agent_and_name() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("TOKEN", true, None)]);
        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &BTreeMap::new(), file_values: &BTreeMap::new() },
        );

        let errors = validate_env_vars(&graph);
        assert_eq!(errors.len(), 1);
        let msg = errors[0].to_string();
        assert!(msg.contains("agent-a"), "got: {msg}");
        assert!(msg.contains("TOKEN"), "got: {msg}");
    }

    #[test]
    fn prefixed_override_satisfies_a_required_var() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("TOKEN", true, None)]);
        let file = map(&[("AGENT_A_TOKEN", "abc")]);

        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &BTreeMap::new(), file_values: &file },
        );

        assert_eq!(
            graph.specs["agent-a"].env.get("TOKEN").map(String::as_str),
            Some("abc")
        );
        assert!(validate_env_vars(&graph).is_empty());
    }

    #[test]
    fn errors_from_all_agents_are_collected_together() {
        let mut graph = graph_with_agent("agent-a", vec![env_var("TOKEN", true, None)]);
        let second = graph_with_agent("agent-b", vec![env_var("SECRET", true, None)]);
        graph.specs.extend(second.specs);

        apply_config(
            &mut graph,
            &ConfigFile::default(),
            &EnvLayers { process_env: &BTreeMap::new(), file_values: &BTreeMap::new() },
        );

        let errors = validate_env_vars(&graph);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn config_identity_is_applied_to_the_spec() {
        let mut graph = graph_with_agent("agent-a", vec![]);
        apply_config(
            &mut graph,
            &config_with_env("agent-a", &[]),
            &EnvLayers { process_env: &BTreeMap::new(), file_values: &BTreeMap::new() },
        );
        let spec = &graph.specs["agent-a"];
        assert_eq!(spec.agent_id, "id-1");
        assert_eq!(spec.api_key, "key-1");
    }
}
