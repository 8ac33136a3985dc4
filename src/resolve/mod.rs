// ABOUTME: Resolves pipeline configuration from file values, environment, and overrides.
// ABOUTME: Produces an immutable PipelineConfig once, before any stage runs.

mod error;
mod pipeline_config;

pub use error::ConfigError;
pub use pipeline_config::{
    APP_REPO_URL, CHART_REPO_URL, IMAGE_REPOSITORY, IMAGE_TAG, NAMESPACE, PipelineConfig,
};

use crate::config::EnvValue;
use crate::types::ConfigKey;
use std::collections::{BTreeMap, HashMap};

/// Prefix for environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "HALYARD_";

/// Default deployment namespace.
pub const DEFAULT_NAMESPACE: &str = "apps";

/// Build counter consulted when no image tag is configured.
pub const BUILD_NUMBER_VAR: &str = "BUILD_NUMBER";

/// Everything the resolver reads, captured up front.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// `values:` from the pipeline file.
    pub file: BTreeMap<ConfigKey, EnvValue>,
    /// Snapshot of process environment variables.
    pub environment: HashMap<String, String>,
    /// Caller-supplied `key=value` overrides.
    pub overrides: BTreeMap<ConfigKey, String>,
}

impl ConfigSource {
    /// Capture the process environment alongside file values and overrides.
    pub fn capture(
        file: BTreeMap<ConfigKey, EnvValue>,
        overrides: BTreeMap<ConfigKey, String>,
    ) -> Self {
        Self {
            file,
            environment: std::env::vars().collect(),
            overrides,
        }
    }

    fn lookup(&self, key: &ConfigKey) -> Option<String> {
        if let Some(value) = self.overrides.get(key).filter(|v| !v.is_empty()) {
            return Some(value.clone());
        }

        let env_name = format!("{}{}", ENV_PREFIX, key.env_var());
        if let Some(value) = self.environment.get(&env_name).filter(|v| !v.is_empty()) {
            return Some(value.clone());
        }

        self.file
            .get(key)
            .and_then(|v| v.resolve_in(&self.environment))
            .filter(|v| !v.is_empty())
    }

    fn env(&self, var: &str) -> Option<String> {
        self.environment.get(var).filter(|v| !v.is_empty()).cloned()
    }
}

/// Parse a `key=value` override.
pub fn parse_override(s: &str) -> Result<(ConfigKey, String), ConfigError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(s.to_string()))?;
    Ok((ConfigKey::new(key.trim())?, value.to_string()))
}

/// Declaration of one configuration key.
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub key: ConfigKey,
    pub required: bool,
    pub default: Option<String>,
    /// Environment variable consulted after all explicit sources.
    pub fallback_env: Option<String>,
}

impl KeySpec {
    pub fn required(key: ConfigKey) -> Self {
        Self {
            key,
            required: true,
            default: None,
            fallback_env: None,
        }
    }

    pub fn optional(key: ConfigKey) -> Self {
        Self {
            required: false,
            ..Self::required(key)
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_fallback_env(mut self, var: impl Into<String>) -> Self {
        self.fallback_env = Some(var.into());
        self
    }
}

fn known(key: &'static str) -> ConfigKey {
    ConfigKey::well_known(key)
}

/// Resolves a `ConfigSource` against a key schema.
#[derive(Debug, Clone)]
pub struct Resolver {
    schema: Vec<KeySpec>,
}

impl Resolver {
    /// Schema of the build-push-deploy pipeline.
    pub fn standard() -> Self {
        Self {
            schema: vec![
                KeySpec::required(known(IMAGE_REPOSITORY)),
                KeySpec::required(known(IMAGE_TAG)).with_fallback_env(BUILD_NUMBER_VAR),
                KeySpec::required(known(APP_REPO_URL)),
                KeySpec::required(known(CHART_REPO_URL)),
                KeySpec::optional(known(NAMESPACE)).with_default(DEFAULT_NAMESPACE),
            ],
        }
    }

    pub fn empty() -> Self {
        Self { schema: Vec::new() }
    }

    pub fn with_key(mut self, spec: KeySpec) -> Self {
        match self.schema.iter_mut().find(|s| s.key == spec.key) {
            Some(existing) => *existing = spec,
            None => self.schema.push(spec),
        }
        self
    }

    /// Apply file-level defaults, replacing built-in ones.
    pub fn with_defaults(mut self, defaults: &BTreeMap<ConfigKey, String>) -> Self {
        for (key, value) in defaults {
            match self.schema.iter_mut().find(|s| &s.key == key) {
                Some(spec) => spec.default = Some(value.clone()),
                None => self
                    .schema
                    .push(KeySpec::optional(key.clone()).with_default(value.clone())),
            }
        }
        self
    }

    pub fn schema(&self) -> &[KeySpec] {
        &self.schema
    }

    /// Resolve every key. Pure over `source`.
    ///
    /// Schema keys are checked in declaration order, so the first missing
    /// required key is the one reported.
    pub fn resolve(&self, source: &ConfigSource) -> Result<PipelineConfig, ConfigError> {
        let mut values = BTreeMap::new();

        for spec in &self.schema {
            let value = source
                .lookup(&spec.key)
                .or_else(|| spec.fallback_env.as_deref().and_then(|v| source.env(v)))
                .or_else(|| spec.default.clone().filter(|d| !d.is_empty()));

            match value {
                Some(value) => {
                    values.insert(spec.key.clone(), value);
                }
                None if spec.required => return Err(ConfigError::MissingKey(spec.key.clone())),
                None => {}
            }
        }

        let extras = source.file.keys().chain(source.overrides.keys());
        for key in extras {
            if values.contains_key(key) {
                continue;
            }
            if let Some(value) = source.lookup(key) {
                values.insert(key.clone(), value);
            }
        }

        tracing::debug!(keys = values.len(), "resolved pipeline configuration");
        Ok(values.into_iter().collect())
    }
}
