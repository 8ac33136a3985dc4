// ABOUTME: Validated configuration key names.
// ABOUTME: Keys are snake_case and map onto upper-case environment variables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigKeyError {
    #[error("configuration key cannot be empty")]
    Empty,

    #[error("configuration key must start with a lowercase letter: {0}")]
    BadStart(String),

    #[error("invalid character in configuration key '{key}': '{found}'")]
    InvalidChar { key: String, found: char },
}

/// A configuration key such as `image_tag`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn new(value: &str) -> Result<Self, ConfigKeyError> {
        let mut chars = value.chars();
        match chars.next() {
            None => return Err(ConfigKeyError::Empty),
            Some(c) if !c.is_ascii_lowercase() => {
                return Err(ConfigKeyError::BadStart(value.to_string()));
            }
            Some(_) => {}
        }

        if let Some(found) =
            chars.find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '_')
        {
            return Err(ConfigKeyError::InvalidChar {
                key: value.to_string(),
                found,
            });
        }

        Ok(Self(value.to_string()))
    }

    /// Keys compiled into the binary. Must already be valid.
    pub(crate) fn well_known(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid well-known key {value}");
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Environment variable name used when passing this key to a command.
    pub fn env_var(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl Borrow<str> for ConfigKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ConfigKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(&value).map_err(serde::de::Error::custom)
    }
}
