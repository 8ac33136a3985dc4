// ABOUTME: Custom serde deserializers for pipeline file types.
// ABOUTME: Enforces a non-empty stage list.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::StageConfig;

pub fn deserialize_stages<'de, D>(deserializer: D) -> Result<NonEmpty<StageConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let stages: Vec<StageConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(stages)
        .ok_or_else(|| serde::de::Error::custom("at least one stage is required"))
}
