//! User config file model and merge rules.
//!
//! A config file fixes identifiers, credentials, ports, environment
//! overrides and scheduling hints per agent name. Entries for names not
//! present in the resolved graph are inert.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level config file (`config.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub config: BTreeMap<String, AgentConfig>,
}

/// Per-agent configuration entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub scheduling: Option<SchedulingHints>,
}

/// Platform scheduling hints, passed through to the deployment target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingHints {
    #[serde(default)]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Merge a user config over generated defaults. User values win field by
/// field; env var maps overlay key by key; entries for unknown agents are
/// added verbatim.
#[must_use]
pub fn merge_configs(mut generated: ConfigFile, user: ConfigFile) -> ConfigFile {
    for (name, user_entry) in user.config {
        match generated.config.get_mut(&name) {
            Some(entry) => {
                if user_entry.id.is_some() {
                    entry.id = user_entry.id;
                }
                if user_entry.api_key.is_some() {
                    entry.api_key = user_entry.api_key;
                }
                if user_entry.port.is_some() {
                    entry.port = user_entry.port;
                }
                for (key, value) in user_entry.env_vars {
                    entry.env_vars.insert(key, value);
                }
                if user_entry.scheduling.is_some() {
                    entry.scheduling = user_entry.scheduling;
                }
            }
            None => {
                generated.config.insert(name, user_entry);
            }
        }
    }
    generated
}
