//! Application layer — use-case services and the port traits they depend on.
//!
//! Services import only from `crate::domain` and `crate::application`; all
//! I/O is routed through injected port traits implemented in `crate::infra`.

pub mod lock;
pub mod ports;
pub mod services;
