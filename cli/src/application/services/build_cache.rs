//! Content-addressed build cache.
//!
//! An agent image is tagged with a fingerprint of its source payload and
//! base image; a matching image on the runtime host short-circuits the
//! build. Concurrent attempts to build the same tag serialize on a striped
//! lock while unrelated builds proceed in parallel.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::application::lock::StripedLock;
use crate::application::ports::{ImageStore, PullOutcome, SourcePayload};
use crate::domain::error::BuildError;

/// Stripe count for the build lock table. Bounds lock contention; distinct
/// tags sharing a stripe only serialize, never conflict.
const BUILD_LOCK_STRIPES: usize = 64;

/// Fingerprint of a source payload against a base image.
///
/// Only file byte sizes are hashed, in relative-path order, followed by the
/// base image reference. Content changes that preserve a file's size do not
/// change the tag; `force_build` is the escape hatch for that case.
#[must_use]
pub fn source_fingerprint(payload: &SourcePayload, base_image: &str) -> String {
    let mut hasher = Sha256::new();
    for (_, size) in &payload.files {
        hasher.update(size.to_le_bytes());
    }
    hasher.update(base_image.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build cache instance. Constructed once per deployment run and passed
/// explicitly to every build call; the stripe table is its only state.
pub struct BuildCache {
    locks: StripedLock,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: StripedLock::new(BUILD_LOCK_STRIPES),
        }
    }

    /// Ensure an image for `payload` exists, building it on a cache miss.
    /// Returns the final image reference (`image_name:<fingerprint>`).
    ///
    /// # Errors
    ///
    /// Fails when more than one image matches the tag (ambiguous store
    /// state), when the base image cannot be found, or when the build itself
    /// fails. Never retries.
    pub async fn ensure_image(
        &self,
        store: &impl ImageStore,
        payload: &SourcePayload,
        image_name: &str,
        base_image: &str,
        force_build: bool,
        build_args: &BTreeMap<String, String>,
    ) -> Result<String> {
        let reference = format!("{image_name}:{}", source_fingerprint(payload, base_image));

        // Serializes concurrent builds of the same tag; released on every
        // exit path when the guard drops.
        let _guard = self.locks.lock(&reference).await;

        if !force_build {
            let matches = store
                .list_images(&reference)
                .await
                .with_context(|| format!("listing images matching '{reference}'"))?;
            if matches.len() == 1 {
                return Ok(reference);
            }
            if matches.len() > 1 {
                return Err(BuildError::AmbiguousImage(reference).into());
            }
        }

        self.ensure_base_image(store, base_image).await?;

        store
            .build_image(&reference, payload, base_image, build_args)
            .await
            .with_context(|| format!("building image '{reference}'"))?;

        Ok(reference)
    }

    async fn ensure_base_image(&self, store: &impl ImageStore, base_image: &str) -> Result<()> {
        let present = store
            .list_images(base_image)
            .await
            .with_context(|| format!("listing base image '{base_image}'"))?;
        if !present.is_empty() {
            return Ok(());
        }
        match store
            .pull_image(base_image)
            .await
            .with_context(|| format!("pulling base image '{base_image}'"))?
        {
            PullOutcome::Pulled => Ok(()),
            PullOutcome::NotFound => Err(BuildError::BaseImageNotFound(base_image.to_owned()).into()),
        }
    }
}
