//! `DeploymentRunner` implementation over `docker compose`.
//!
//! The compiled deployment is rendered into a compose document — one service
//! per agent, only the main agent published on the host — written under the
//! convoy state dir and driven through the `docker compose` CLI.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use convoy_common::DeploymentOption;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::application::ports::{CommandRunner, DeploymentRunner, DeploymentSummary};
use crate::domain::{DeploymentBuildSpec, INTERNAL_API_PORT};
use crate::infra::command_runner::stderr_of;

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static PROJECT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9-_]+").expect("valid regex"));

/// Compose project name for a deployment: lowercased with every character
/// outside `[a-z0-9-_]` removed.
#[must_use]
pub fn project_name(deployment: &str) -> String {
    PROJECT_NAME_RE
        .replace_all(&deployment.to_lowercase(), "")
        .into_owned()
}

// ── Compose document model ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ComposeDocument {
    name: String,
    services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Serialize)]
struct ComposeService {
    image: String,
    environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deploy: Option<ComposeDeploy>,
}

#[derive(Debug, Serialize)]
struct ComposeDeploy {
    replicas: u32,
}

#[derive(Debug, Deserialize)]
struct ComposeLsEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Status")]
    status: String,
}

// ── Runner ────────────────────────────────────────────────────────────────────

/// Production deployment runner for the local compose platform.
pub struct ComposeRunner<R: CommandRunner> {
    runner: R,
    state_dir: PathBuf,
}

impl<R: CommandRunner> ComposeRunner<R> {
    #[must_use]
    pub fn new(runner: R, state_dir: PathBuf) -> Self {
        Self { runner, state_dir }
    }

    fn compose_file(&self, main_agent: &str) -> PathBuf {
        self.state_dir
            .join(format!("compose-{}.yaml", project_name(main_agent)))
    }

    fn storage_dir(&self, agent: &str) -> PathBuf {
        self.state_dir.join("storage").join(agent)
    }

    fn render(
        &self,
        main_agent: &str,
        specs: &BTreeMap<String, DeploymentBuildSpec>,
        dependencies: &BTreeMap<String, Vec<String>>,
    ) -> ComposeDocument {
        let mut services = BTreeMap::new();
        for (name, built) in specs {
            let spec = &built.spec;
            let mut environment = spec.env.clone();
            environment.insert("API_HOST".to_owned(), "0.0.0.0".to_owned());
            environment.insert("API_PORT".to_owned(), INTERNAL_API_PORT.to_string());
            environment.insert("API_KEY".to_owned(), spec.api_key.clone());
            environment.insert(
                "AGENT_STORAGE_FILE".to_owned(),
                "/opt/storage/state.json".to_owned(),
            );
            if let DeploymentOption::SourceCode(source) = spec.selected_deployment() {
                environment.insert(
                    "AGENT_FRAMEWORK".to_owned(),
                    source.framework.kind().to_owned(),
                );
                environment.insert(
                    "AGENTS_REF".to_owned(),
                    format!(r#"{{"{}": "{}"}}"#, spec.agent_id, source.framework.entrypoint()),
                );
            }

            // Only the main agent is reachable from outside the deployment's
            // private network.
            let ports = match spec.port {
                Some(port) if name == main_agent => {
                    vec![format!("0.0.0.0:{port}:{INTERNAL_API_PORT}")]
                }
                _ => vec![],
            };

            let depends_on = dependencies
                .get(name)
                .map(|deps| {
                    deps.iter()
                        .filter_map(|dep| specs.get(dep).map(|d| d.service_name.clone()))
                        .collect()
                })
                .unwrap_or_default();

            let (labels, deploy) = spec
                .scheduling
                .as_ref()
                .map(|hints| {
                    (
                        hints.labels.clone(),
                        hints.replicas.map(|replicas| ComposeDeploy { replicas }),
                    )
                })
                .unwrap_or_default();

            services.insert(
                built.service_name.clone(),
                ComposeService {
                    image: built.image.clone(),
                    environment,
                    ports,
                    volumes: vec![format!(
                        "{}:/opt/storage",
                        self.storage_dir(name).display()
                    )],
                    depends_on,
                    labels,
                    deploy,
                },
            );
        }

        ComposeDocument {
            name: project_name(main_agent),
            services,
        }
    }
}

impl<R: CommandRunner> DeploymentRunner for ComposeRunner<R> {
    async fn apply(
        &self,
        main_agent: &str,
        specs: &BTreeMap<String, DeploymentBuildSpec>,
        dependencies: &BTreeMap<String, Vec<String>>,
        dry_run: bool,
    ) -> Result<Option<Vec<u8>>> {
        let document = self.render(main_agent, specs, dependencies);
        let rendered = serde_yaml::to_string(&document).context("rendering compose document")?;

        if dry_run {
            return Ok(Some(rendered.into_bytes()));
        }

        let compose_file = self.compose_file(main_agent);
        let storage_dirs: Vec<PathBuf> = specs.keys().map(|name| self.storage_dir(name)).collect();
        let file_for_write = compose_file.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            for dir in &storage_dirs {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating storage dir {}", dir.display()))?;
            }
            std::fs::write(&file_for_write, rendered)
                .with_context(|| format!("writing compose file {}", file_for_write.display()))?;
            Ok(())
        })
        .await
        .context("compose write task panicked")??;

        let project = project_name(main_agent);
        let file_arg = compose_file.to_string_lossy().into_owned();
        let status = self
            .runner
            .run_streaming(
                "docker",
                &[
                    "compose",
                    "-f",
                    &file_arg,
                    "-p",
                    &project,
                    "up",
                    "-d",
                    "--remove-orphans",
                ],
            )
            .await
            .context("starting deployment")?;
        if !status.success() {
            bail!("docker compose up failed for deployment '{main_agent}'");
        }
        Ok(None)
    }

    async fn remove(&self, deployment: &str) -> Result<()> {
        let project = project_name(deployment);
        let compose_file = self.compose_file(deployment);
        let file_arg = compose_file.to_string_lossy().into_owned();

        let mut args = vec!["compose"];
        if compose_file.exists() {
            args.extend(["-f", &file_arg]);
        }
        args.extend(["-p", &project, "down", "--remove-orphans"]);

        let output = self
            .runner
            .run("docker", &args)
            .await
            .with_context(|| format!("stopping deployment '{deployment}'"))?;
        if !output.status.success() {
            bail!("docker compose down failed for '{deployment}': {}", stderr_of(&output));
        }
        Ok(())
    }

    async fn logs(&self, deployment: &str, agents: &[String], follow: bool) -> Result<()> {
        let project = project_name(deployment);
        let mut args = vec!["compose", "-p", &project, "logs", "--tail", "100"];
        if follow {
            args.push("--follow");
        }
        for agent in agents {
            args.push(agent);
        }

        let status = self
            .runner
            .run_streaming("docker", &args)
            .await
            .with_context(|| format!("streaming logs for '{deployment}'"))?;
        if !status.success() {
            bail!("docker compose logs failed for '{deployment}'");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeploymentSummary>> {
        let output = self
            .runner
            .run("docker", &["compose", "ls", "--format", "json"])
            .await
            .context("listing deployments")?;
        if !output.status.success() {
            bail!("docker compose ls failed: {}", stderr_of(&output));
        }
        let entries: Vec<ComposeLsEntry> =
            serde_json::from_slice(&output.stdout).context("parsing docker compose ls output")?;
        Ok(entries
            .into_iter()
            .map(|entry| DeploymentSummary {
                name: entry.name,
                status: entry.status,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::process::{ExitStatus, Output};

    use convoy_common::{
        AgentManifest, AgentRef, DeploymentSpec, FrameworkConfig, ImageDeployment,
        ManifestMetadata, SourceDeployment,
    };

    use super::*;
    use crate::domain::AgentSpec;

    struct NoopRunner;

    impl CommandRunner for NoopRunner {
        async fn run(&self, _: &str, _: &[&str]) -> Result<Output> {
            anyhow::bail!("not expected")
        }
        async fn run_streaming(&self, _: &str, _: &[&str]) -> Result<ExitStatus> {
            anyhow::bail!("not expected")
        }
    }

    fn built_spec(name: &str, option: DeploymentOption, port: Option<u16>) -> DeploymentBuildSpec {
        DeploymentBuildSpec {
            spec: AgentSpec {
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
                        options: vec![option],
                        env_vars: vec![],
                        dependencies: vec![],
                    },
                },
                manifest_ref: format!("{name}.json"),
                selected_option: 0,
                env: BTreeMap::from([("WIRED".to_owned(), "value".to_owned())]),
                agent_id: format!("id-{name}"),
                api_key: format!("key-{name}"),
                port,
                scheduling: None,
            },
            image: format!("ghcr.io/example/{name}:tag"),
            service_name: name.to_owned(),
        }
    }

    fn runner() -> ComposeRunner<NoopRunner> {
        ComposeRunner::new(NoopRunner, PathBuf::from("/var/lib/convoy"))
    }

    fn two_service_setup() -> (
        BTreeMap<String, DeploymentBuildSpec>,
        BTreeMap<String, Vec<String>>,
    ) {
        let specs = BTreeMap::from([
            (
                "main".to_owned(),
                built_spec(
                    "main",
                    DeploymentOption::Docker(ImageDeployment {
                        name: None,
                        image: "ghcr.io/example/main:1".to_owned(),
                    }),
                    Some(15000),
                ),
            ),
            (
                "helper".to_owned(),
                built_spec(
                    "helper",
                    DeploymentOption::SourceCode(SourceDeployment {
                        name: None,
                        url: "./src".to_owned(),
                        framework: FrameworkConfig::Langgraph {
                            graph: "helper.app:graph".to_owned(),
                        },
                    }),
                    None,
                ),
            ),
        ]);
        let deps = BTreeMap::from([("main".to_owned(), vec!["helper".to_owned()])]);
        (specs, deps)
    }

    #[test]
    fn project_name_is_sanitized() {
        assert_eq!(project_name("Mail Composer!"), "mailcomposer");
        assert_eq!(project_name("agent_A-1"), "agent_a-1");
    }

    #[test]
    fn only_the_main_service_publishes_a_port() {
        let (specs, deps) = two_service_setup();
        let document = runner().render("main", &specs, &deps);

        assert_eq!(
            document.services["main"].ports,
            vec!["0.0.0.0:15000:8000".to_owned()]
        );
        assert!(document.services["helper"].ports.is_empty());
    }

    #[test]
    fn services_carry_identity_and_wired_environment() {
        let (specs, deps) = two_service_setup();
        let document = runner().render("main", &specs, &deps);

        let env = &document.services["main"].environment;
        assert_eq!(env.get("API_KEY").map(String::as_str), Some("key-main"));
        assert_eq!(env.get("API_PORT").map(String::as_str), Some("8000"));
        assert_eq!(env.get("WIRED").map(String::as_str), Some("value"));
    }

    #[test]
    fn source_built_services_get_framework_environment() {
        let (specs, deps) = two_service_setup();
        let document = runner().render("main", &specs, &deps);

        let env = &document.services["helper"].environment;
        assert_eq!(env.get("AGENT_FRAMEWORK").map(String::as_str), Some("langgraph"));
        assert_eq!(
            env.get("AGENTS_REF").map(String::as_str),
            Some(r#"{"id-helper": "helper.app:graph"}"#)
        );
        // Packaged services have no framework env.
        assert!(!document.services["main"].environment.contains_key("AGENT_FRAMEWORK"));
    }

    #[test]
    fn dependencies_become_depends_on_edges() {
        let (specs, deps) = two_service_setup();
        let document = runner().render("main", &specs, &deps);

        assert_eq!(document.services["main"].depends_on, vec!["helper".to_owned()]);
        assert!(document.services["helper"].depends_on.is_empty());
    }

    #[test]
    fn rendered_yaml_parses_back_and_names_the_project() {
        let (specs, deps) = two_service_setup();
        let document = runner().render("main", &specs, &deps);
        let yaml = serde_yaml::to_string(&document).expect("serialize");

        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).expect("round trip");
        assert_eq!(parsed["name"].as_str(), Some("main"));
        assert!(parsed["services"]["helper"]["volumes"][0]
            .as_str()
            .unwrap()
            .ends_with(":/opt/storage"));
    }
}
