// ABOUTME: Executable stage definitions built from the pipeline file.
// ABOUTME: Knows its required keys and renders itself into an Invocation.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::template::Template;
use crate::config::{CommandConfig, StageConfig};
use crate::provision::{CommandLine, Invocation};
use crate::resolve::{ConfigError, PipelineConfig};
use crate::types::{ConfigKey, EnvironmentName, StageName};

/// Environment variable carrying the running stage's name.
pub const STAGE_ENV_VAR: &str = "HALYARD_STAGE";

pub const DEFAULT_SET_FLAG: &str = "--set-string";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageCommand {
    /// Arguments with `${key}` placeholders, run without a shell.
    Argv(Vec<Template>),
    /// Shell script; parameters reach it as environment variables.
    Script(String),
}

/// One step of a pipeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    name: StageName,
    environment: EnvironmentName,
    command: StageCommand,
    required: BTreeSet<ConfigKey>,
    timeout: Option<Duration>,
    overrides: BTreeMap<String, ConfigKey>,
    set_flag: String,
}

impl Stage {
    /// A stage running `script` through the environment's shell.
    pub fn script(name: StageName, environment: EnvironmentName, script: impl Into<String>) -> Self {
        Self {
            name,
            environment,
            command: StageCommand::Script(script.into()),
            required: BTreeSet::new(),
            timeout: None,
            overrides: BTreeMap::new(),
            set_flag: DEFAULT_SET_FLAG.to_string(),
        }
    }

    /// A stage running an argument vector; placeholders become required keys.
    pub fn argv<S: AsRef<str>>(
        name: StageName,
        environment: EnvironmentName,
        args: &[S],
    ) -> Result<Self, ConfigError> {
        if args.is_empty() {
            return Err(ConfigError::InvalidStage {
                stage: name,
                reason: "command is empty".to_string(),
            });
        }

        let mut templates = Vec::with_capacity(args.len());
        for arg in args {
            let template = Template::parse(arg.as_ref()).map_err(|e| ConfigError::InvalidStage {
                stage: name.clone(),
                reason: e.to_string(),
            })?;
            templates.push(template);
        }

        let required = templates.iter().flat_map(Template::keys).cloned().collect();
        Ok(Self {
            name,
            environment,
            command: StageCommand::Argv(templates),
            required,
            timeout: None,
            overrides: BTreeMap::new(),
            set_flag: DEFAULT_SET_FLAG.to_string(),
        })
    }

    pub fn from_config(config: &StageConfig) -> Result<Self, ConfigError> {
        let mut stage = match &config.run {
            CommandConfig::Script(script) => {
                Self::script(config.name.clone(), config.environment.clone(), script.clone())
            }
            CommandConfig::Argv(args) => {
                Self::argv(config.name.clone(), config.environment.clone(), args)?
            }
        };

        for key in &config.needs {
            stage = stage.requires(key.clone());
        }
        for (path, key) in &config.set {
            stage = stage.with_override(path.clone(), key.clone())?;
        }
        stage.set_flag = config.set_flag.clone();
        stage.timeout = config.timeout;
        Ok(stage)
    }

    /// Declare a key the command needs besides its placeholders.
    pub fn requires(mut self, key: ConfigKey) -> Self {
        self.required.insert(key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Append `<set_flag> <path>=<value of key>` to the command line.
    ///
    /// Only argv commands accept overrides.
    pub fn with_override(
        mut self,
        path: impl Into<String>,
        key: ConfigKey,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        if matches!(self.command, StageCommand::Script(_)) {
            return Err(ConfigError::InvalidStage {
                stage: self.name,
                reason: "`set` requires an argv command".to_string(),
            });
        }
        if path.is_empty() || path.contains('=') || path.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidStage {
                stage: self.name,
                reason: format!("invalid override path '{}'", path),
            });
        }
        self.required.insert(key.clone());
        self.overrides.insert(path, key);
        Ok(self)
    }

    pub fn name(&self) -> &StageName {
        &self.name
    }

    pub fn environment(&self) -> &EnvironmentName {
        &self.environment
    }

    pub fn command(&self) -> &StageCommand {
        &self.command
    }

    /// Declared needs, placeholder keys and override keys.
    pub fn required_keys(&self) -> &BTreeSet<ConfigKey> {
        &self.required
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn overrides(&self) -> &BTreeMap<String, ConfigKey> {
        &self.overrides
    }

    /// First required key `config` cannot supply.
    pub fn check(&self, config: &PipelineConfig) -> Result<(), ConfigError> {
        for key in &self.required {
            config.require(key)?;
        }
        Ok(())
    }

    /// Build the concrete command and its exported parameters.
    pub fn render(&self, config: &PipelineConfig) -> Result<Invocation, ConfigError> {
        self.check(config)?;

        let command = match &self.command {
            StageCommand::Script(script) => CommandLine::Script(script.clone()),
            StageCommand::Argv(templates) => {
                let mut args = templates
                    .iter()
                    .map(|t| t.render(config))
                    .collect::<Result<Vec<_>, _>>()?;
                for (path, key) in &self.overrides {
                    args.push(self.set_flag.clone());
                    args.push(format!("{}={}", path, config.require(key)?));
                }
                CommandLine::Argv(args)
            }
        };

        let mut env = BTreeMap::new();
        for key in &self.required {
            env.insert(key.env_var(), config.require(key)?.to_string());
        }
        env.insert(STAGE_ENV_VAR.to_string(), self.name.to_string());

        Ok(Invocation { command, env })
    }
}
