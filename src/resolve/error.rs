// ABOUTME: Configuration errors raised before any stage runs.
// ABOUTME: Covers missing keys, unknown stages/environments, and bad stage definitions.

use crate::types::{ConfigKey, ConfigKeyError, EnvironmentName, StageName};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration key: {0}")]
    MissingKey(ConfigKey),

    #[error("duplicate stage name: {0}")]
    DuplicateStage(StageName),

    #[error("stage '{stage}' uses undeclared environment '{environment}'")]
    UnknownEnvironment {
        stage: StageName,
        environment: EnvironmentName,
    },

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("stage '{stage}': {reason}")]
    InvalidStage { stage: StageName, reason: String },

    #[error("invalid override '{0}': expected key=value")]
    InvalidOverride(String),

    #[error(transparent)]
    InvalidKey(#[from] ConfigKeyError),
}

impl ConfigError {
    /// The key that could not be resolved, if this is a missing-key error.
    pub fn missing_key(&self) -> Option<&ConfigKey> {
        match self {
            ConfigError::MissingKey(key) => Some(key),
            _ => None,
        }
    }
}
