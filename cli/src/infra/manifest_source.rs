//! Manifest loaders — one implementation per reference scheme, plus the
//! router that picks between them. The router is constructed once at
//! resolution start; nothing downstream branches on scheme again.

use anyhow::{Context, Result, bail};
use convoy_common::AgentManifest;
use url::Url;

use crate::application::ports::ManifestSource;

/// Default directory service for content-addressed manifest lookups.
/// Overridden by `CONVOY_DIRECTORY_URL`.
const DEFAULT_DIRECTORY_URL: &str = "http://localhost:8888";

/// Parse manifest bytes. YAML is a superset of JSON, so one parser covers
/// both on-disk formats.
fn parse_manifest(bytes: &[u8]) -> Result<AgentManifest> {
    serde_yaml::from_slice(bytes).context("parsing agent manifest")
}

// ── File ──────────────────────────────────────────────────────────────────────

/// Loads manifests from the local filesystem (`file://` or bare paths).
pub struct FileManifestSource;

impl ManifestSource for FileManifestSource {
    async fn load(&self, reference: &str) -> Result<AgentManifest> {
        let path = reference
            .strip_prefix("file://")
            .unwrap_or(reference)
            .to_owned();
        let bytes = tokio::task::spawn_blocking({
            let path = path.clone();
            move || std::fs::read(&path)
        })
        .await
        .context("manifest read task panicked")?
        .with_context(|| format!("reading manifest file '{path}'"))?;
        parse_manifest(&bytes)
    }
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// Loads manifests from `http://` / `https://` locations.
pub struct HttpManifestSource {
    client: reqwest::Client,
}

impl HttpManifestSource {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ManifestSource for HttpManifestSource {
    async fn load(&self, reference: &str) -> Result<AgentManifest> {
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .with_context(|| format!("fetching manifest from '{reference}'"))?;
        if !response.status().is_success() {
            bail!("failed to fetch manifest '{reference}': {}", response.status());
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("reading manifest body from '{reference}'"))?;
        parse_manifest(&bytes)
    }
}

// ── Content-addressed directory ───────────────────────────────────────────────

/// Loads manifests by digest (`sha256:<hex>`) from a directory service.
pub struct DigestManifestSource {
    client: reqwest::Client,
    directory_url: String,
}

impl DigestManifestSource {
    #[must_use]
    pub fn new(client: reqwest::Client, directory_url: String) -> Self {
        Self {
            client,
            directory_url,
        }
    }
}

impl ManifestSource for DigestManifestSource {
    async fn load(&self, reference: &str) -> Result<AgentManifest> {
        let url = format!(
            "{}/objects/{reference}",
            self.directory_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("pulling manifest '{reference}' from directory"))?;
        if !response.status().is_success() {
            bail!("failed to pull manifest '{reference}' from directory: {}", response.status());
        }
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("reading manifest '{reference}' from directory"))?;
        parse_manifest(&bytes)
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Routes a manifest reference to the loader for its scheme. Holds one
/// loader per supported scheme; unsupported schemes are rejected here and
/// nowhere else.
pub struct SchemeRouter {
    file: FileManifestSource,
    http: HttpManifestSource,
    digest: DigestManifestSource,
}

impl SchemeRouter {
    /// Build the router with the directory service address taken from
    /// `CONVOY_DIRECTORY_URL` when set.
    #[must_use]
    pub fn new() -> Self {
        let directory_url = std::env::var("CONVOY_DIRECTORY_URL")
            .unwrap_or_else(|_| DEFAULT_DIRECTORY_URL.to_owned());
        let client = reqwest::Client::new();
        Self {
            file: FileManifestSource,
            http: HttpManifestSource::new(client.clone()),
            digest: DigestManifestSource::new(client, directory_url),
        }
    }
}

impl Default for SchemeRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestSource for SchemeRouter {
    async fn load(&self, reference: &str) -> Result<AgentManifest> {
        match Url::parse(reference).ok().map(|u| u.scheme().to_owned()) {
            Some(scheme) if scheme == "http" || scheme == "https" => {
                self.http.load(reference).await
            }
            Some(scheme) if scheme == "sha256" => self.digest.load(reference).await,
            Some(scheme) if scheme == "file" => self.file.load(reference).await,
            // No scheme: a bare filesystem path.
            None => self.file.load(reference).await,
            Some(scheme) => bail!("unsupported manifest location '{reference}' (scheme '{scheme}')"),
        }
    }
}
