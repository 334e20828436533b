//! Passthrough environment for the container.
//!
//! The caller names variables (`--env KEY[,KEY]`); their values are copied
//! from the launching process. A missing or empty variable is fatal, since the
//! service under test would otherwise start with a silently broken config.

use std::collections::BTreeMap;

use crate::errors::{ItestError, ItestResult};
use crate::runtime::options::split_list;

/// Lookup against the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve a comma-separated list of variable names through `lookup`.
pub fn resolve_env<F>(names: &str, lookup: F) -> ItestResult<BTreeMap<String, String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut environment = BTreeMap::new();
    for name in split_list(names) {
        match lookup(name) {
            Some(value) if !value.is_empty() => {
                environment.insert(name.to_string(), value);
            }
            _ => return Err(ItestError::MissingEnv(name.to_string())),
        }
    }
    Ok(environment)
}
