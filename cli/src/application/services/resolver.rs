//! Graph resolution — loads the root manifest and every transitive
//! dependency, producing one [`AgentSpec`] per deployment name plus the
//! dependency adjacency.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use anyhow::{Context, Result};
use convoy_common::EnvVarValues;
use url::Url;

use crate::application::ports::ManifestSource;
use crate::domain::error::ResolveError;
use crate::domain::{AgentSpec, ResolvedGraph};

/// Resolve the dependency graph rooted at `root_ref`.
///
/// `deployment_name` overrides the root manifest's declared name;
/// `deployment_option` selects the root's deployment option by name;
/// `overrides` is the user's environment value tree for the whole run.
///
/// # Errors
///
/// Fails on manifest load/validation errors, duplicate deployment names,
/// dependencies without a reference URL, and dependency cycles.
pub async fn resolve_graph(
    source: &impl ManifestSource,
    root_ref: &str,
    deployment_name: Option<&str>,
    deployment_option: Option<&str>,
    overrides: &EnvVarValues,
) -> Result<ResolvedGraph> {
    let mut resolver = GraphResolver::default();
    resolver
        .resolve_node(
            source,
            root_ref.to_owned(),
            deployment_name.map(str::to_owned),
            deployment_option.map(str::to_owned),
            overrides.clone(),
        )
        .await?;

    Ok(ResolvedGraph {
        root_name: resolver.root_name.unwrap_or_default(),
        specs: resolver.specs,
        dependencies: resolver.dependencies,
    })
}

#[derive(Default)]
struct GraphResolver {
    root_name: Option<String>,
    specs: BTreeMap<String, AgentSpec>,
    dependencies: BTreeMap<String, Vec<String>>,
    /// Manifest references on the active recursion path.
    stack: Vec<String>,
}

impl GraphResolver {
    /// Recursive worker. Boxed because async recursion needs an indirection
    /// point; single-threaded, so the future does not need `Send`.
    fn resolve_node<'a, S: ManifestSource>(
        &'a mut self,
        source: &'a S,
        reference: String,
        explicit_name: Option<String>,
        option: Option<String>,
        tree: EnvVarValues,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + 'a>> {
        Box::pin(async move {
            if self.stack.contains(&reference) {
                return Err(ResolveError::DependencyCycle(reference).into());
            }

            let manifest = source
                .load(&reference)
                .await
                .with_context(|| format!("loading manifest '{reference}'"))?;
            manifest
                .validate()
                .with_context(|| format!("manifest validation failed for '{reference}'"))?;
            let selected_option = manifest.option_index(option.as_deref())?;

            let name = match explicit_name {
                Some(name) if !name.is_empty() => name,
                _ => manifest.metadata.reference.name.clone(),
            };
            if self.root_name.is_none() {
                self.root_name = Some(name.clone());
            }

            // Hard stop: two manifests sharing a deployment name would
            // silently overwrite each other's configuration.
            if self.specs.contains_key(&name) {
                return Err(ResolveError::DuplicateName(name).into());
            }

            let dependencies = manifest.deployment.dependencies.clone();
            self.specs.insert(
                name.clone(),
                AgentSpec {
                    deployment_name: name.clone(),
                    manifest,
                    manifest_ref: reference.clone(),
                    selected_option,
                    env: tree.values.clone(),
                    agent_id: String::new(),
                    api_key: String::new(),
                    port: None,
                    scheduling: None,
                },
            );

            if dependencies.is_empty() {
                return Ok(());
            }

            self.stack.push(reference.clone());
            let mut dep_names = Vec::with_capacity(dependencies.len());
            for dependency in &dependencies {
                dep_names.push(dependency.name.clone());

                let dep_ref = dependency
                    .reference
                    .url
                    .as_deref()
                    .filter(|url| !url.is_empty())
                    .ok_or_else(|| ResolveError::MissingDependencyRef(dependency.name.clone()))?;

                let merged =
                    tree.merged_for_dependency(dependency.env_var_values.as_ref(), &dependency.name);
                let normalized = normalize_dependency_ref(&reference, dep_ref);

                self.resolve_node(
                    source,
                    normalized,
                    Some(dependency.name.clone()),
                    dependency.deployment_option.clone(),
                    merged,
                )
                .await
                .with_context(|| {
                    format!("failed building spec for dependent agent '{}'", dependency.name)
                })?;
            }
            self.dependencies.insert(name, dep_names);
            self.stack.pop();
            Ok(())
        })
    }
}

/// Normalize a dependency's manifest reference.
///
/// References with a non-`file` scheme (network locations, content-addressed
/// digests) pass through unchanged. Everything else is a local path: a
/// `file://` prefix is stripped, absolute paths pass through, and relative
/// paths are resolved against the directory of the current manifest's
/// reference, then lexically cleaned.
#[must_use]
pub fn normalize_dependency_ref(current_manifest_ref: &str, dependency_ref: &str) -> String {
    if let Ok(url) = Url::parse(dependency_ref) {
        if url.scheme() != "file" {
            return dependency_ref.to_owned();
        }
    }

    let raw = dependency_ref
        .strip_prefix("file://")
        .unwrap_or(dependency_ref);
    let path = Path::new(raw);
    if path.is_absolute() {
        return raw.to_owned();
    }

    let base = Path::new(current_manifest_ref)
        .parent()
        .unwrap_or_else(|| Path::new(""));
    clean_path(&base.join(raw))
}

/// Lexical path cleanup: drops `.` components and resolves `..` against the
/// preceding component without touching the filesystem.
fn clean_path(path: &Path) -> String {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = cleaned.pop();
                if !popped && !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned.to_string_lossy().into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use convoy_common::{
        AgentDependency, AgentManifest, AgentRef, DependencyEnvVarValues, DeploymentOption,
        DeploymentSpec, ImageDeployment, ManifestMetadata,
    };

    use super::*;

    // ── In-memory manifest source ────────────────────────────────────────────

    struct MapSource {
        manifests: HashMap<String, AgentManifest>,
    }

    impl MapSource {
        fn new(entries: Vec<(&str, AgentManifest)>) -> Self {
            Self {
                manifests: entries
                    .into_iter()
                    .map(|(k, v)| (k.to_owned(), v))
                    .collect(),
            }
        }
    }

    impl ManifestSource for MapSource {
        async fn load(&self, reference: &str) -> Result<AgentManifest> {
            self.manifests
                .get(reference)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no manifest at '{reference}'"))
        }
    }

    // ── Manifest builders ────────────────────────────────────────────────────

    fn docker_option(name: Option<&str>, image: &str) -> DeploymentOption {
        DeploymentOption::Docker(ImageDeployment {
            name: name.map(str::to_owned),
            image: image.to_owned(),
        })
    }

    fn manifest(name: &str, deps: Vec<AgentDependency>) -> AgentManifest {
        AgentManifest {
            metadata: ManifestMetadata {
                reference: AgentRef {
                    name: name.to_owned(),
                    version: "0.1.0".to_owned(),
                    url: None,
                },
                description: None,
            },
            deployment: DeploymentSpec {
                options: vec![docker_option(None, &format!("ghcr.io/example/{name}:latest"))],
                env_vars: vec![],
                dependencies: deps,
            },
        }
    }

    fn dependency(name: &str, url: Option<&str>) -> AgentDependency {
        AgentDependency {
            name: name.to_owned(),
            reference: AgentRef {
                name: name.to_owned(),
                version: "0.1.0".to_owned(),
                url: url.map(str::to_owned),
            },
            deployment_option: None,
            env_var_values: None,
        }
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn resolves_transitive_dependencies() {
        let source = MapSource::new(vec![
            ("a.json", manifest("agent-a", vec![dependency("agent-b", Some("b.json"))])),
            ("b.json", manifest("agent-b", vec![dependency("agent-c", Some("c.json"))])),
            ("c.json", manifest("agent-c", vec![])),
        ]);

        let graph = resolve_graph(&source, "a.json", None, None, &EnvVarValues::default())
            .await
            .expect("graph should resolve");

        assert_eq!(graph.root_name, "agent-a");
        assert_eq!(graph.specs.len(), 3);
        assert_eq!(graph.dependencies.get("agent-a").unwrap(), &vec!["agent-b".to_owned()]);
        assert_eq!(graph.dependencies.get("agent-b").unwrap(), &vec!["agent-c".to_owned()]);
        // A leaf agent has no adjacency entry, not an empty one.
        assert!(!graph.dependencies.contains_key("agent-c"));
    }

    #[tokio::test]
    async fn explicit_deployment_name_overrides_manifest_name() {
        let source = MapSource::new(vec![("a.json", manifest("agent-a", vec![]))]);
        let graph = resolve_graph(&source, "a.json", Some("primary"), None, &EnvVarValues::default())
            .await
            .expect("graph should resolve");
        assert_eq!(graph.root_name, "primary");
        assert!(graph.specs.contains_key("primary"));
    }

    #[tokio::test]
    async fn duplicate_deployment_name_is_a_hard_error() {
        // Root and a transitive dependency both resolve to "agent-a".
        let source = MapSource::new(vec![
            ("a.json", manifest("agent-a", vec![dependency("agent-a", Some("other.json"))])),
            ("other.json", manifest("agent-a", vec![])),
        ]);

        let err = resolve_graph(&source, "a.json", None, None, &EnvVarValues::default())
            .await
            .expect_err("duplicate names must fail");
        assert!(
            format!("{err:#}").contains("agent deployment name must be unique: agent-a"),
            "got: {err:#}"
        );
    }

    #[tokio::test]
    async fn dependency_without_ref_url_fails() {
        let source = MapSource::new(vec![(
            "a.json",
            manifest("agent-a", vec![dependency("agent-b", None)]),
        )]);

        let err = resolve_graph(&source, "a.json", None, None, &EnvVarValues::default())
            .await
            .expect_err("missing ref url must fail");
        assert!(format!("{err:#}").contains("ref url is required for dependency: agent-b"));
    }

    #[tokio::test]
    async fn dependency_cycle_is_detected() {
        // a -> b -> a, with a fresh deployment name on the second visit so
        // the duplicate-name check cannot catch it first.
        let source = MapSource::new(vec![
            ("a.json", manifest("agent-a", vec![dependency("agent-b", Some("b.json"))])),
            ("b.json", manifest("agent-b", vec![dependency("agent-a-again", Some("a.json"))])),
        ]);

        let err = resolve_graph(&source, "a.json", None, None, &EnvVarValues::default())
            .await
            .expect_err("cycle must fail");
        assert!(format!("{err:#}").contains("dependency cycle detected"), "got: {err:#}");
    }

    #[tokio::test]
    async fn relative_dependency_refs_resolve_against_current_manifest() {
        let source = MapSource::new(vec![
            (
                "/agents/a/manifest.json",
                manifest("agent-a", vec![dependency("agent-b", Some("../b/manifest.json"))]),
            ),
            ("/agents/b/manifest.json", manifest("agent-b", vec![])),
        ]);

        let graph = resolve_graph(
            &source,
            "/agents/a/manifest.json",
            None,
            None,
            &EnvVarValues::default(),
        )
        .await
        .expect("graph should resolve");
        assert_eq!(graph.specs["agent-b"].manifest_ref, "/agents/b/manifest.json");
    }

    #[tokio::test]
    async fn env_tree_values_seed_dependency_specs() {
        let mut dep = dependency("agent-b", Some("b.json"));
        dep.env_var_values = Some(EnvVarValues {
            values: [("DECLARED".to_owned(), "from-manifest".to_owned())].into(),
            dependencies: vec![],
        });
        let source = MapSource::new(vec![
            ("a.json", manifest("agent-a", vec![dep])),
            ("b.json", manifest("agent-b", vec![])),
        ]);

        let overrides = EnvVarValues {
            values: [("ROOT_ONLY".to_owned(), "root".to_owned())].into(),
            dependencies: vec![DependencyEnvVarValues {
                name: "agent-b".to_owned(),
                tree: EnvVarValues {
                    values: [("DECLARED".to_owned(), "from-user".to_owned())].into(),
                    dependencies: vec![],
                },
            }],
        };

        let graph = resolve_graph(&source, "a.json", None, None, &overrides)
            .await
            .expect("graph should resolve");

        // Root gets the top-level flat values.
        assert_eq!(
            graph.specs["agent-a"].env.get("ROOT_ONLY").map(String::as_str),
            Some("root")
        );
        // The dependency's declared value is overridden by the user subtree.
        assert_eq!(
            graph.specs["agent-b"].env.get("DECLARED").map(String::as_str),
            Some("from-user")
        );
        // Subtree values never leak into other agents.
        assert!(!graph.specs["agent-a"].env.contains_key("DECLARED"));
    }

    #[tokio::test]
    async fn dependency_deployment_option_is_selected_by_name() {
        let mut dep_manifest = manifest("agent-b", vec![]);
        dep_manifest.deployment.options = vec![
            docker_option(Some("first"), "ghcr.io/example/b:1"),
            docker_option(Some("second"), "ghcr.io/example/b:2"),
        ];
        let mut dep = dependency("agent-b", Some("b.json"));
        dep.deployment_option = Some("second".to_owned());

        let source = MapSource::new(vec![
            ("a.json", manifest("agent-a", vec![dep])),
            ("b.json", dep_manifest),
        ]);

        let graph = resolve_graph(&source, "a.json", None, None, &EnvVarValues::default())
            .await
            .expect("graph should resolve");
        assert_eq!(graph.specs["agent-b"].selected_option, 1);
    }

    #[tokio::test]
    async fn manifest_without_deployment_options_fails_validation() {
        let mut bad = manifest("agent-a", vec![]);
        bad.deployment.options.clear();
        let source = MapSource::new(vec![("a.json", bad)]);

        let err = resolve_graph(&source, "a.json", None, None, &EnvVarValues::default())
            .await
            .expect_err("validation must fail");
        assert!(format!("{err:#}").contains("no deployment option"));
    }

    // ── Reference normalization ──────────────────────────────────────────────

    #[test]
    fn normalize_dependency_ref_table() {
        let cases = [
            // (current manifest ref, dependency ref, expected)
            ("", "/hurricane.json", "/hurricane.json"),
            ("/etwc/agent/agent_A_manifest.json", "/hurricane.json", "/hurricane.json"),
            ("/etwc/agent/agent_A_manifest.json", "hurricane.json", "/etwc/agent/hurricane.json"),
            ("/etwc/agent/agent_A_manifest.json", "./hurricane.json", "/etwc/agent/hurricane.json"),
            ("/etwc/agent/agent_A_manifest.json", "./../hurricane.json", "/etwc/hurricane.json"),
            ("/etwc/agent/agent_A_manifest.json", "../hurricane.json", "/etwc/hurricane.json"),
            (
                "/etwc/agent/agent_A_manifest.json",
                "http://example.com/hurricane.json",
                "http://example.com/hurricane.json",
            ),
            ("/etwc/agent/agent_A_manifest.json", "file://./", "/etwc/agent"),
            (
                "/etwc/agent/agent_A_manifest.json",
                "file://./hurricane.json",
                "/etwc/agent/hurricane.json",
            ),
            (
                "/etwc/agent/agent_A_manifest.json",
                "file://./../hurricane.json",
                "/etwc/hurricane.json",
            ),
            (
                "/etwc/agent/agent_A_manifest.json",
                "sha256:0f10b2a4d9effc0a91b3bc6b364de8f14dcfef1f8ab0ef1c762dd2f8c89bc9e5",
                "sha256:0f10b2a4d9effc0a91b3bc6b364de8f14dcfef1f8ab0ef1c762dd2f8c89bc9e5",
            ),
        ];
        for (current, dep_ref, expected) in cases {
            assert_eq!(
                normalize_dependency_ref(current, dep_ref),
                expected,
                "normalize({current:?}, {dep_ref:?})"
            );
        }
    }
}
