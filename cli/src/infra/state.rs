//! Convoy state directory and deployment records.
//!
//! `~/.convoy` (or `CONVOY_HOME`) holds rendered compose files, per-agent
//! storage folders, and `deployments.json` — a record of what convoy last
//! deployed, written atomically via temp file + rename.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolve (and create) the convoy state directory.
///
/// # Errors
///
/// Returns an error when no home directory can be determined or the
/// directory cannot be created.
pub fn state_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("CONVOY_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?
            .join(".convoy"),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating state directory {}", dir.display()))?;
    Ok(dir)
}

/// One deployed stack as convoy last saw it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub main_agent_id: String,
    pub main_port: u16,
    pub created_at: DateTime<Utc>,
}

/// Store for deployment records.
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// Record store inside the given state directory.
    #[must_use]
    pub fn new(state_dir: &std::path::Path) -> Self {
        Self {
            path: state_dir.join("deployments.json"),
        }
    }

    /// Load all records, keyed by deployment name. A missing file is an
    /// empty store.
    pub fn load(&self) -> Result<BTreeMap<String, DeploymentRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", self.path.display()))
    }

    /// Insert or replace the record for `record.name`.
    pub fn upsert(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.insert(record.name.clone(), record);
        self.save(&records)
    }

    /// Drop the record for `name`, if present.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut records = self.load()?;
        if records.remove(name).is_some() {
            self.save(&records)?;
        }
        Ok(())
    }

    fn save(&self, records: &BTreeMap<String, DeploymentRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(records).context("serializing records")?;

        // Atomic write via temp file then rename.
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("finalizing {}", self.path.display()))?;
        Ok(())
    }
}
