// ABOUTME: Pipeline file types and parsing for halyard.yml.
// ABOUTME: Handles YAML parsing, discovery, and structural validation.

mod deserialize;
mod env_value;
mod environment;
mod init;
mod settings;
mod stage;

pub use env_value::EnvValue;
pub use environment::{
    ContainerEnvironment, EnvironmentConfig, LocalEnvironment, PullPolicy, VolumeSpec,
};
pub use init::init_config;
pub use settings::Settings;
pub use stage::{CommandConfig, StageConfig};

use crate::error::{Error, Result};
use crate::pipeline::Stage;
use crate::resolve::ConfigError;
use crate::types::{ConfigKey, EnvironmentName, PipelineName};
use deserialize::deserialize_stages;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "halyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "halyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".halyard/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineFile {
    pub pipeline: PipelineName,

    #[serde(default)]
    pub values: BTreeMap<ConfigKey, EnvValue>,

    /// Defaults for keys beyond the built-in schema, or replacements for
    /// built-in defaults.
    #[serde(default)]
    pub defaults: BTreeMap<ConfigKey, String>,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub environments: BTreeMap<EnvironmentName, EnvironmentConfig>,

    #[serde(deserialize_with = "deserialize_stages")]
    pub stages: NonEmpty<StageConfig>,

    #[serde(skip)]
    base_dir: PathBuf,
}

impl PipelineFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: PipelineFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut file = Self::from_yaml(&content)?;
        file.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(file)
    }

    /// Find the pipeline file in `dir`, trying each known filename in turn.
    pub fn discover(dir: &Path) -> Result<PathBuf> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        candidates
            .into_iter()
            .find(|path| path.exists())
            .ok_or_else(|| Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for stage in &self.stages {
            if !seen.insert(&stage.name) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
            if !self.environments.contains_key(&stage.environment) {
                return Err(ConfigError::UnknownEnvironment {
                    stage: stage.name.clone(),
                    environment: stage.environment.clone(),
                });
            }
        }

        self.stages().map(|_| ())
    }

    /// Build executable stages in declared order.
    pub fn stages(&self) -> std::result::Result<Vec<Stage>, ConfigError> {
        self.stages.iter().map(Stage::from_config).collect()
    }

    /// Directory the pipeline file was loaded from.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Absolute (or base-relative) workspace directory shared by all stages.
    pub fn workspace_dir(&self) -> PathBuf {
        if self.settings.workspace.is_absolute() {
            self.settings.workspace.clone()
        } else {
            self.base_dir.join(&self.settings.workspace)
        }
    }
}
