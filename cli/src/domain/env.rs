//! Pure environment-variable helpers: the agent name prefix and the
//! individual precedence layers applied by the environment engine.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use convoy_common::EnvVarDef;
use regex::Regex;

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9]+").expect("valid regex"));

/// Environment-variable prefix for an agent name: uppercased, every run of
/// non-alphanumeric characters collapsed to a single `_`, plus a trailing `_`.
///
/// `email-reviewer` becomes `EMAIL_REVIEWER_`.
#[must_use]
pub fn env_var_prefix(agent_name: &str) -> String {
    let upper = agent_name.to_uppercase();
    format!("{}_", NON_ALNUM_RE.replace_all(&upper, "_"))
}

/// Copy every manifest-declared variable that has a value in `source` into
/// `env`, keyed by its bare name.
pub fn set_declared_from(
    env: &mut BTreeMap<String, String>,
    declared: &[EnvVarDef],
    source: &BTreeMap<String, String>,
) {
    for def in declared {
        if let Some(value) = source.get(&def.name) {
            env.insert(def.name.clone(), value.clone());
        }
    }
}

/// Copy every `source` entry starting with `prefix` into `env`, with the
/// prefix stripped. Prefixed entries apply whether or not the variable is
/// declared in the manifest.
pub fn set_prefixed_from(
    env: &mut BTreeMap<String, String>,
    prefix: &str,
    source: &BTreeMap<String, String>,
) {
    for (key, value) in source {
        if let Some(name) = key.strip_prefix(prefix) {
            if !name.is_empty() {
                env.insert(name.to_owned(), value.clone());
            }
        }
    }
}

/// Fill in manifest defaults for declared variables still absent after all
/// explicit layers. Presence wins: an empty-but-present value blocks the
/// default.
pub fn fill_defaults(env: &mut BTreeMap<String, String>, declared: &[EnvVarDef]) {
    for def in declared {
        if let Some(default) = &def.default_value {
            if !env.contains_key(&def.name) {
                env.insert(def.name.clone(), default.clone());
            }
        }
    }
}

/// Names of required, defaultless declared variables absent from `env`.
#[must_use]
pub fn missing_required(env: &BTreeMap<String, String>, declared: &[EnvVarDef]) -> Vec<String> {
    declared
        .iter()
        .filter(|def| def.required && def.default_value.is_none() && !env.contains_key(&def.name))
        .map(|def| def.name.clone())
        .collect()
}
