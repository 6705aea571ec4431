//! Default config generation — one entry per resolved agent with a
//! generated identity, honoring prefixed `ID` / `API_KEY` / `PORT`
//! overrides from the override file and the process environment.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use uuid::Uuid;

use crate::domain::ResolvedGraph;
use crate::domain::config::{AgentConfig, ConfigFile};
use crate::domain::env::env_var_prefix;

/// Generate a default config entry for every agent in the graph.
///
/// The override file wins over the process environment for identity lookups;
/// anything still unset gets a fresh UUID. A `<PREFIX>PORT` value must parse
/// as a port number.
///
/// # Errors
///
/// Returns an error when a `<PREFIX>PORT` override is not a valid port.
pub fn generate_defaults(
    graph: &ResolvedGraph,
    process_env: &BTreeMap<String, String>,
    file_values: &BTreeMap<String, String>,
) -> Result<ConfigFile> {
    let mut config = ConfigFile::default();

    for name in graph.specs.keys() {
        let prefix = env_var_prefix(name);
        let lookup = |suffix: &str| -> Option<String> {
            let key = format!("{prefix}{suffix}");
            file_values
                .get(&key)
                .or_else(|| process_env.get(&key))
                .cloned()
        };

        let id = lookup("ID").unwrap_or_else(|| Uuid::new_v4().to_string());
        let api_key = lookup("API_KEY").unwrap_or_else(|| Uuid::new_v4().to_string());
        let port = match lookup("PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => bail!("invalid port '{raw}' specified for agent '{name}'"),
            },
            None => None,
        };

        config.config.insert(
            name.clone(),
            AgentConfig {
                id: Some(id),
                api_key: Some(api_key),
                port,
                env_vars: BTreeMap::new(),
                scheduling: None,
            },
        );
    }

    Ok(config)
}
