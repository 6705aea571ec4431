//! Deployment-spec compilation — wires dependency discovery values into
//! dependent agents, resolves every agent's image, and picks the main
//! agent's external port.
//!
//! Wiring runs before any image build: build arguments may be derived from
//! wired environment values on some platforms. Builds for distinct agents
//! run concurrently; the build cache serializes same-tag builds.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use convoy_common::{DeploymentOption, FrameworkConfig};
use futures::future::try_join_all;

use crate::application::ports::{ImageStore, PortProbe, ProgressReporter, SourceFetcher};
use crate::application::services::build_cache::BuildCache;
use crate::domain::{AgentSpec, DeploymentBuildSpec, INTERNAL_API_PORT, ResolvedGraph};
use crate::domain::env::env_var_prefix;

/// Inputs shared by every build in one compile run.
pub struct CompileOptions<'a> {
    /// Base image for source-built agents.
    pub base_image: &'a str,
    /// Skip the image cache and rebuild unconditionally.
    pub force_build: bool,
    /// External port override from the CLI; `None` means discover.
    pub external_port: Option<u16>,
}

/// The compiled deployment: terminal build specs plus the adjacency, handed
/// to the platform runner as one batch.
#[derive(Debug)]
pub struct CompiledDeployment {
    pub main_agent: String,
    pub specs: BTreeMap<String, DeploymentBuildSpec>,
    pub dependencies: BTreeMap<String, Vec<String>>,
}

/// Compile a resolved graph into deployment build specs.
///
/// # Errors
///
/// Fails when a dependency name has no spec, when source fetching or image
/// building fails, or when no external port can be determined for the main
/// agent.
pub async fn compile(
    mut graph: ResolvedGraph,
    cache: &BuildCache,
    store: &impl ImageStore,
    sources: &impl SourceFetcher,
    ports: &impl PortProbe,
    reporter: &impl ProgressReporter,
    opts: &CompileOptions<'_>,
) -> Result<CompiledDeployment> {
    wire_dependencies(&mut graph)?;

    let main_agent = graph.root_name.clone();
    let port = select_main_port(&graph, &main_agent, ports, opts).await?;
    if let Some(main_spec) = graph.specs.get_mut(&main_agent) {
        main_spec.port = Some(port);
    }

    let builds = graph
        .specs
        .into_iter()
        .map(|(name, spec)| build_agent(name, spec, cache, store, sources, reporter, opts));
    let specs = try_join_all(builds).await?.into_iter().collect();

    Ok(CompiledDeployment {
        main_agent,
        specs,
        dependencies: graph.dependencies,
    })
}

/// Inject every dependency's discovery values into its dependents.
///
/// For each edge A→B, A's environment gains `<PREFIX_B>API_KEY` (the
/// credential wrapped in the header shape the consuming agent sends),
/// `<PREFIX_B>ID`, and `<PREFIX_B>ENDPOINT` pointing at B's service name on
/// the internal API port.
fn wire_dependencies(graph: &mut ResolvedGraph) -> Result<()> {
    let mut injections: Vec<(String, String, String)> = Vec::new();
    for (dependent, deps) in &graph.dependencies {
        for dep_name in deps {
            let dep = graph
                .specs
                .get(dep_name)
                .with_context(|| format!("dependency '{dep_name}' of '{dependent}' has no spec"))?;
            let prefix = env_var_prefix(dep_name);
            injections.push((
                dependent.clone(),
                format!("{prefix}API_KEY"),
                format!(r#"{{"x-api-key": "{}"}}"#, dep.api_key),
            ));
            injections.push((dependent.clone(), format!("{prefix}ID"), dep.agent_id.clone()));
            injections.push((
                dependent.clone(),
                format!("{prefix}ENDPOINT"),
                format!("http://{}:{INTERNAL_API_PORT}", dep.deployment_name),
            ));
        }
    }
    for (dependent, key, value) in injections {
        if let Some(spec) = graph.specs.get_mut(&dependent) {
            spec.env.insert(key, value);
        }
    }
    Ok(())
}

/// External port for the main agent: CLI override, configured port, the port
/// of an already-running instance with the same service name, or a free
/// ephemeral port.
async fn select_main_port(
    graph: &ResolvedGraph,
    main_agent: &str,
    ports: &impl PortProbe,
    opts: &CompileOptions<'_>,
) -> Result<u16> {
    if let Some(port) = opts.external_port {
        return Ok(port);
    }
    if let Some(port) = graph.specs.get(main_agent).and_then(|s| s.port) {
        return Ok(port);
    }
    if let Some(port) = ports
        .running_service_port(main_agent, main_agent)
        .await
        .context("checking for a running instance")?
    {
        return Ok(port);
    }
    ports.free_port().await.context("discovering a free port")
}

async fn build_agent(
    name: String,
    spec: AgentSpec,
    cache: &BuildCache,
    store: &impl ImageStore,
    sources: &impl SourceFetcher,
    reporter: &impl ProgressReporter,
    opts: &CompileOptions<'_>,
) -> Result<(String, DeploymentBuildSpec)> {
    let image = match spec.selected_deployment() {
        DeploymentOption::Docker(packaged) => packaged.image.clone(),
        DeploymentOption::SourceCode(source) => {
            reporter.step(&format!("building image for agent '{name}'..."));
            let payload = sources
                .fetch(&spec.manifest_ref, &source.url)
                .await
                .with_context(|| format!("fetching source for agent '{name}'"))?;
            let image_name = format!("convoy/{}", spec.manifest.metadata.reference.name);
            let build_args = framework_build_args(&source.framework);
            let image = cache
                .ensure_image(
                    store,
                    &payload,
                    &image_name,
                    opts.base_image,
                    opts.force_build,
                    &build_args,
                )
                .await
                .with_context(|| format!("building agent '{name}'"))?;
            reporter.success(&format!("image ready for agent '{name}'"));
            image
        }
    };

    let service_name = spec.deployment_name.clone();
    Ok((name, DeploymentBuildSpec { spec, image, service_name }))
}

fn framework_build_args(framework: &FrameworkConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("AGENT_FRAMEWORK".to_owned(), framework.kind().to_owned()),
        ("AGENT_ENTRYPOINT".to_owned(), framework.entrypoint().to_owned()),
    ])
}
