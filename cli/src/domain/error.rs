//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to
//! `anyhow::Error` via the `?` operator. Structural manifest errors live in
//! `convoy_common::ManifestError`; the enums here cover resolution,
//! environment validation and image building.

use thiserror::Error;

// ── Resolution errors ─────────────────────────────────────────────────────────

/// Errors raised while resolving the dependency graph. All are fatal.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("agent deployment name must be unique: {0}")]
    DuplicateName(String),

    #[error("ref url is required for dependency: {0}")]
    MissingDependencyRef(String),

    #[error("dependency cycle detected: manifest '{0}' is already being resolved")]
    DependencyCycle(String),
}

// ── Environment errors ────────────────────────────────────────────────────────

/// Environment validation errors. Collected across all agents and reported
/// together rather than short-circuiting on the first one.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("agent '{agent}' is missing required env var {var}")]
    MissingRequired { agent: String, var: String },
}

// ── Build errors ──────────────────────────────────────────────────────────────

/// Errors raised while ensuring an agent's container image. Fatal for the
/// whole run; builds are never retried here.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("more than one image matches '{0}' on the container runtime host")]
    AmbiguousImage(String),

    #[error("base image '{0}' not found")]
    BaseImageNotFound(String),
}
