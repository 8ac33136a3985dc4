// ABOUTME: Immutable, fully resolved configuration for one pipeline run.
// ABOUTME: Values are never empty; lookups go through require() for typed errors.

use std::collections::BTreeMap;

use super::ConfigError;
use crate::types::ConfigKey;

pub const IMAGE_REPOSITORY: &str = "image_repository";
pub const IMAGE_TAG: &str = "image_tag";
pub const APP_REPO_URL: &str = "app_repo_url";
pub const CHART_REPO_URL: &str = "chart_repo_url";
pub const NAMESPACE: &str = "namespace";

/// Resolved configuration values.
///
/// Constructed once per run by the resolver (or directly in tests) and
/// shared read-only with the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    values: BTreeMap<ConfigKey, String>,
}

impl PipelineConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &ConfigKey) -> Result<&str, ConfigError> {
        self.get(key.as_str())
            .ok_or_else(|| ConfigError::MissingKey(key.clone()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ConfigKey> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConfigKey, &str)> {
        self.values.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `repository:tag` of the image this run produces, when both are known.
    pub fn image(&self) -> Option<String> {
        match (self.get(IMAGE_REPOSITORY), self.get(IMAGE_TAG)) {
            (Some(repo), Some(tag)) => Some(format!("{}:{}", repo, tag)),
            _ => None,
        }
    }
}

/// Build a config from pairs, dropping empty values so they count as absent.
impl FromIterator<(ConfigKey, String)> for PipelineConfig {
    fn from_iter<I: IntoIterator<Item = (ConfigKey, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().filter(|(_, v)| !v.is_empty()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Convenience constructor from string pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| -> Result<_, ConfigError> { Ok((ConfigKey::new(k)?, v.to_string())) })
            .collect()
    }
}
