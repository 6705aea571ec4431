//! The recursive environment value document.
//!
//! An override file (and the `env_var_values` block of a dependency
//! declaration) is a tree: a flat map of values for the agent it is scoped
//! to, plus named subtrees for that agent's dependencies. Subtrees only ever
//! apply to the dependency whose name they carry; subtrees naming anything
//! else are ignored at that level but kept for deeper recursion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Environment values scoped to one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarValues {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyEnvVarValues>,
}

/// A subtree of [`EnvVarValues`] scoped to one named dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEnvVarValues {
    pub name: String,
    #[serde(flatten)]
    pub tree: EnvVarValues,
}

impl EnvVarValues {
    /// Compute the value tree a dependency should be resolved with.
    ///
    /// Starts from the dependency's own declared tree and overlays every
    /// subtree of `self` whose name matches `dependency`: flat values from
    /// the parent win over declared ones, and nested subtrees are merged by
    /// name (unmatched subtrees are appended, preserving them for deeper
    /// levels of the graph).
    #[must_use]
    pub fn merged_for_dependency(
        &self,
        declared: Option<&EnvVarValues>,
        dependency: &str,
    ) -> EnvVarValues {
        let mut merged = declared.cloned().unwrap_or_default();
        for subtree in self.dependencies.iter().filter(|d| d.name == dependency) {
            overlay_values(&mut merged.values, &subtree.tree.values);
            merge_subtrees(&mut merged.dependencies, &subtree.tree.dependencies);
        }
        merged
    }

    /// True when the tree carries no values at any depth.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.dependencies.iter().all(|d| d.tree.is_empty())
    }
}

fn overlay_values(dest: &mut BTreeMap<String, String>, src: &BTreeMap<String, String>) {
    for (key, value) in src {
        dest.insert(key.clone(), value.clone());
    }
}

fn merge_subtrees(dest: &mut Vec<DependencyEnvVarValues>, src: &[DependencyEnvVarValues]) {
    for subtree in src {
        match dest.iter_mut().find(|d| d.name == subtree.name) {
            Some(existing) => {
                overlay_values(&mut existing.tree.values, &subtree.tree.values);
                merge_subtrees(&mut existing.tree.dependencies, &subtree.tree.dependencies);
            }
            None => dest.push(subtree.clone()),
        }
    }
}
