// ABOUTME: Application-wide error types for halyard.
// ABOUTME: Uses thiserror; each variant maps to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

use crate::resolve::ConfigError;

/// Exit codes, following the sysexits convention.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const UNAVAILABLE: i32 = 69;
    pub const CANT_CREATE: i32 = 73;
    pub const IO: i32 = 74;
    pub const CONFIG: i32 = 78;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("cannot create {path}: {source}")]
    CannotCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    #[error("stage '{stage}': {reason}")]
    Provision { stage: String, reason: String },

    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Config(_)
            | Error::Yaml(_) => exit::CONFIG,
            Error::CannotCreate { .. } => exit::CANT_CREATE,
            Error::Io(_) => exit::IO,
            Error::Hook(_) | Error::StageFailed { .. } => exit::FAILURE,
            Error::Provision { .. } => exit::UNAVAILABLE,
            Error::Cancelled => exit::CANCELLED,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
