//! `SourceFetcher` implementation for local source trees.
//!
//! A source URL is resolved the same way dependency manifest references are:
//! `file://` prefixes are stripped and relative paths resolve against the
//! manifest's directory. Remote source locations are rejected here.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use url::Url;

use crate::application::ports::{SourceFetcher, SourcePayload};
use crate::application::services::resolver::normalize_dependency_ref;
use crate::infra::fs::walk_source_files;

/// Fetches agent sources from the local filesystem.
pub struct LocalSourceFetcher;

impl SourceFetcher for LocalSourceFetcher {
    async fn fetch(&self, manifest_ref: &str, source_url: &str) -> Result<SourcePayload> {
        if let Ok(url) = Url::parse(source_url) {
            if url.scheme() != "file" {
                bail!(
                    "unsupported source location '{source_url}': only local source trees can be built"
                );
            }
        }

        let root = PathBuf::from(normalize_dependency_ref(manifest_ref, source_url));
        let scanned_root = root.clone();
        let files = tokio::task::spawn_blocking(move || walk_source_files(&scanned_root))
            .await
            .context("source scan task panicked")?
            .with_context(|| format!("scanning source tree '{}'", root.display()))?;

        Ok(SourcePayload { root, files })
    }
}
