//! Application services — one module per use-case of the deployment
//! compiler pipeline: graph resolution, environment resolution, default
//! config generation, image build caching, and deployment-spec compilation.

pub mod build_cache;
pub mod compiler;
pub mod config_defaults;
pub mod environment;
pub mod resolver;
