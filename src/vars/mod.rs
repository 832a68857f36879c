//! The variable block handed to the host build tool.
//!
//! A pass produces one variable per distinct signature, holding the rendered
//! artifact. The host tool receives them as a flat YAML mapping (its `--vars`
//! argument), merged with any variables the user passed in themselves.

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::query::Signature;

/// Signature → artifact mapping, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    generated: BTreeMap<String, String>,
}

impl VariableSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the artifact for `signature`. A later insert for the same signature wins.
    pub fn insert(&mut self, signature: &Signature, artifact: impl Into<String>) {
        self.generated.insert(signature.as_str().to_string(), artifact.into());
    }

    /// Artifact recorded for `signature`.
    #[must_use]
    pub fn get(&self, signature: &str) -> Option<&str> {
        self.generated.get(signature).map(String::as_str)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generated.len()
    }

    /// Whether no variables were generated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generated.is_empty()
    }

    /// Iterate `(signature, artifact)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.generated.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge with user-supplied variables and serialise as YAML.
    ///
    /// `user_vars` is the YAML mapping the user passed on the command line
    /// (empty string for none). User values win on key collision.
    ///
    /// # Errors
    ///
    /// Fails if `user_vars` is not a YAML mapping.
    pub fn to_yaml(&self, user_vars: &str) -> Result<String> {
        let mut merged = Mapping::new();
        for (key, value) in &self.generated {
            merged.insert(Value::String(key.clone()), Value::String(value.clone()));
        }
        for (key, value) in parse_user_vars(user_vars)? {
            merged.insert(key, value);
        }
        serde_yaml::to_string(&merged).context("Failed to serialise variables as YAML")
    }
}

fn parse_user_vars(user_vars: &str) -> Result<Mapping> {
    if user_vars.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(user_vars).context("Invalid YAML in --vars")? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(anyhow::anyhow!(
            "--vars must be a YAML mapping, got: {}",
            serde_yaml::to_string(&other).unwrap_or_default().trim()
        )),
    }
}
