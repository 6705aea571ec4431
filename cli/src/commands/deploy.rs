//! `convoy deploy` — resolve a manifest graph, build images, and start the
//! whole stack.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Args;
use convoy_common::EnvVarValues;

use crate::app::AppContext;
use crate::application::services::build_cache::BuildCache;
use crate::application::services::compiler::{CompileOptions, compile};
use crate::application::services::config_defaults::generate_defaults;
use crate::application::services::environment::{EnvLayers, apply_config, validate_env_vars};
use crate::application::services::resolver::resolve_graph;
use crate::application::ports::DeploymentRunner;
use crate::domain::config::{ConfigFile, merge_configs};
use crate::infra::compose::ComposeRunner;
use crate::infra::docker::DockerImageStore;
use crate::infra::manifest_source::SchemeRouter;
use crate::infra::net::DockerPortProbe;
use crate::infra::source::LocalSourceFetcher;
use crate::infra::state::{DeploymentRecord, RecordStore};
use crate::output::progress;

const DEFAULT_BASE_IMAGE: &str = "ghcr.io/agntcy/agent-workflow-server:latest";

#[derive(Args)]
pub struct DeployArgs {
    /// Agent manifest reference: file path, http(s) URL, or sha256 digest
    #[arg(short, long, value_name = "REF")]
    pub manifest: String,

    /// Environment override file (values document)
    #[arg(short, long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Config file fixing agent ids, api keys, ports and scheduling hints
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target platform
    #[arg(short, long, default_value = "docker")]
    pub platform: String,

    /// Render the deployment artifact without applying it
    #[arg(long)]
    pub dry_run: bool,

    /// Rebuild agent images even when a cached build exists
    #[arg(long)]
    pub force_build: bool,

    /// Base image for source-built agents
    #[arg(long, env = "CONVOY_BASE_IMAGE", default_value = DEFAULT_BASE_IMAGE)]
    pub base_image: String,

    /// Remove temporary build folders after building
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    pub delete_build_folders: bool,

    /// External port for the main agent (discovered when omitted)
    #[arg(long)]
    pub port: Option<u16>,

    /// Deployment name override for the root agent
    #[arg(long)]
    pub name: Option<String>,

    /// Deployment option to use for the root agent
    #[arg(long)]
    pub deployment_option: Option<String>,
}

/// Run `convoy deploy`.
///
/// # Errors
///
/// Returns an error on any resolution, validation, build, or apply failure.
pub async fn run(app: &AppContext, args: &DeployArgs) -> Result<()> {
    let ctx = &app.output;

    if args.platform != "docker" {
        bail!("unsupported platform '{}': only 'docker' is available", args.platform);
    }

    let overrides = match &args.env_file {
        Some(path) => load_env_overrides(path)?,
        None => EnvVarValues::default(),
    };
    let user_config = match &args.config {
        Some(path) => load_config(path)?,
        None => ConfigFile::default(),
    };

    // Phase 1: resolve the dependency graph.
    ctx.info(&format!("resolving agent graph from '{}'...", args.manifest));
    let source = SchemeRouter::new();
    let mut graph = resolve_graph(
        &source,
        &args.manifest,
        args.name.as_deref(),
        args.deployment_option.as_deref(),
        &overrides,
    )
    .await?;

    // Phase 2: environment resolution across all layers, errors batched.
    let process_env: BTreeMap<String, String> = std::env::vars().collect();
    let generated = generate_defaults(&graph, &process_env, &overrides.values)?;
    let config = merge_configs(generated, user_config);
    apply_config(
        &mut graph,
        &config,
        &EnvLayers {
            process_env: &process_env,
            file_values: &overrides.values,
        },
    );
    let env_errors = validate_env_vars(&graph);
    if !env_errors.is_empty() {
        for error in &env_errors {
            ctx.error(&error.to_string());
        }
        bail!("{} required environment variable(s) missing", env_errors.len());
    }
    ctx.success(&format!("resolved {} agent(s)", graph.specs.len()));

    // Phase 3: wire dependencies and build images.
    let store = DockerImageStore::new(app.runner, args.delete_build_folders);
    let cache = BuildCache::new();
    let probe = DockerPortProbe::new(app.runner);
    let compiled = compile(
        graph,
        &cache,
        &store,
        &LocalSourceFetcher,
        &probe,
        ctx,
        &CompileOptions {
            base_image: &args.base_image,
            force_build: args.force_build,
            external_port: args.port,
        },
    )
    .await?;

    // Phase 4: apply the whole stack as one batch.
    let runner = ComposeRunner::new(app.runner, app.state_dir.clone());
    let pb = (ctx.show_progress() && !args.dry_run).then(|| progress::spinner("starting services..."));
    let result = runner
        .apply(&compiled.main_agent, &compiled.specs, &compiled.dependencies, args.dry_run)
        .await;
    if let Some(pb) = pb {
        match &result {
            Ok(_) => progress::finish_ok(&pb, "services started"),
            Err(_) => progress::finish_error(&pb, "starting services failed"),
        }
    }
    let artifact = result?;

    if let Some(artifact) = artifact {
        print!("{}", String::from_utf8_lossy(&artifact));
        return Ok(());
    }

    let main = compiled
        .specs
        .get(&compiled.main_agent)
        .context("main agent missing from compiled specs")?;
    let port = main.spec.port.unwrap_or_default();
    RecordStore::new(&app.state_dir).upsert(DeploymentRecord {
        name: compiled.main_agent.clone(),
        main_agent_id: main.spec.agent_id.clone(),
        main_port: port,
        created_at: Utc::now(),
    })?;

    ctx.header(&format!("deployment '{}' is running", compiled.main_agent));
    ctx.kv("endpoint", &format!("http://127.0.0.1:{port}"));
    ctx.kv("agent id", &main.spec.agent_id);
    ctx.kv("api key ", &main.spec.api_key);
    ctx.info(&format!("follow logs with: convoy logs {}", compiled.main_agent));
    Ok(())
}

fn load_env_overrides(path: &Path) -> Result<EnvVarValues> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading env file {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("parsing env file {}", path.display()))
}

fn load_config(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("parsing config file {}", path.display()))
}
