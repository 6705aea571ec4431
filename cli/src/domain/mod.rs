//! Domain logic for convoy — pure types and functions, no I/O, no async.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.

pub mod config;
pub mod env;
pub mod error;
pub mod spec;

pub use spec::{AgentSpec, DeploymentBuildSpec, INTERNAL_API_PORT, ResolvedGraph};
