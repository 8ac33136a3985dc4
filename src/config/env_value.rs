// ABOUTME: Configuration value types with environment-variable indirection.
// ABOUTME: Handles literal values and references like { env: BUILD_NUMBER }.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve against a captured environment.
    ///
    /// Returns `None` when the referenced variable is unset (or empty) and no
    /// default is given; the resolver then decides whether that is an error.
    pub fn resolve_in(&self, environment: &HashMap<String, String>) -> Option<String> {
        match self {
            EnvValue::Literal(s) => Some(s.clone()),
            EnvValue::FromEnv { var, default } => environment
                .get(var)
                .filter(|v| !v.is_empty())
                .cloned()
                .or_else(|| default.clone()),
        }
    }
}
