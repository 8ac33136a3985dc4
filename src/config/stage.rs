// ABOUTME: Stage declarations as written in the pipeline file.
// ABOUTME: Converted into executable pipeline stages after validation.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{ConfigKey, EnvironmentName, StageName};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub name: StageName,

    pub environment: EnvironmentName,

    pub run: CommandConfig,

    /// Keys passed to the command besides those referenced by placeholders.
    #[serde(default)]
    pub needs: Vec<ConfigKey>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Deployment-tool value overrides: value path -> configuration key.
    #[serde(default)]
    pub set: BTreeMap<String, ConfigKey>,

    #[serde(default = "default_set_flag")]
    pub set_flag: String,
}

fn default_set_flag() -> String {
    "--set-string".to_string()
}

/// `run:` accepts a shell script string or an argv list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandConfig {
    Script(String),
    Argv(Vec<String>),
}
