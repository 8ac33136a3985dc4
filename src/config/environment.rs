// ABOUTME: Execution environment declarations for stages.
// ABOUTME: An environment is either a host directory or a container image.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::ImageRef;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum EnvironmentConfig {
    /// Commands run as host processes.
    Local(LocalEnvironment),
    /// Commands run inside a throwaway container.
    Container(ContainerEnvironment),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalEnvironment {
    /// Working directory, relative to the workspace. Defaults to the workspace.
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerEnvironment {
    pub image: ImageRef,

    /// Shell used for keep-alive and script stages.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Mount point of the shared workspace inside the container.
    #[serde(default = "default_container_workdir")]
    pub workdir: String,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub pull: PullPolicy,
}

/// When the container image is pulled before the environment starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullPolicy {
    /// Pull only when the image is missing locally.
    #[default]
    IfNotPresent,
    /// Pull on every acquire, so moving tags such as `latest` are refreshed.
    Always,
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_container_workdir() -> String {
    "/workspace".to_string()
}

/// A bind mount in `source:target[:ro]` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl VolumeSpec {
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(':').collect();
        let (source, target, read_only) = match parts.as_slice() {
            [source, target] => (*source, *target, false),
            [source, target, "ro"] => (*source, *target, true),
            [source, target, "rw"] => (*source, *target, false),
            _ => return Err(format!("invalid volume '{}': expected source:target[:ro]", s)),
        };

        if source.is_empty() || !target.starts_with('/') {
            return Err(format!(
                "invalid volume '{}': target must be an absolute path",
                s
            ));
        }

        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
            read_only,
        })
    }
}

impl<'de> Deserialize<'de> for VolumeSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VolumeSpec::parse(&s).map_err(serde::de::Error::custom)
    }
}
